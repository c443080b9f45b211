use crate::services::ai_service::is_known_subject;
use std::collections::BTreeMap;
use validator::ValidationError;

pub fn known_subject(subject: &str) -> Result<(), ValidationError> {
    if !is_known_subject(subject) {
        return Err(ValidationError::new("unknown_subject"));
    }
    Ok(())
}

pub fn answer_keys(answers: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if answers.keys().any(|k| k.trim().is_empty()) {
        return Err(ValidationError::new("blank_question_id"));
    }
    Ok(())
}
