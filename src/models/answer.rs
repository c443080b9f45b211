use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NO_ANSWER: &str = "No answer provided";

fn default_user_id() -> String {
    "anonymous".to_string()
}

/// One learner submission: question id to answer text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserAnswerSet {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    pub quiz_id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
}

impl UserAnswerSet {
    pub fn new(user_id: impl Into<String>, quiz_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            quiz_id: quiz_id.into(),
            answers: BTreeMap::new(),
        }
    }

    pub fn with_answer(mut self, question_id: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.insert(question_id.into(), answer.into());
        self
    }

    /// Blank answers count as missing.
    pub fn answer_for(&self, question_id: &str) -> Option<&str> {
        self.answers
            .get(question_id)
            .map(|a| a.as_str())
            .filter(|a| !a.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_answers_are_missing() {
        let set = UserAnswerSet::new("u1", "quiz")
            .with_answer("q1", "  ")
            .with_answer("q2", "Ownership");
        assert_eq!(set.answer_for("q1"), None);
        assert_eq!(set.answer_for("q2"), Some("Ownership"));
        assert_eq!(set.answer_for("q3"), None);
    }

    #[test]
    fn user_id_defaults_to_anonymous() {
        let set: UserAnswerSet = serde_json::from_str(r#"{"quiz_id": "abc"}"#).unwrap();
        assert_eq!(set.user_id, "anonymous");
        assert!(set.answers.is_empty());
    }
}
