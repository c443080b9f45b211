use crate::models::answer::UserAnswerSet;
use crate::models::question::Difficulty;
use crate::models::session::{QuizSession, SessionStatus};
use crate::services::hint_service::HintQuery;
use crate::utils::validation::{answer_keys, known_subject};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerateQuizRequest {
    #[validate(custom(function = "known_subject"))]
    pub subject: String,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 1, max = 50, message = "num_questions must be between 1 and 50"))]
    pub num_questions: Option<usize>,
    pub include_coding: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuizResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub message: String,
    pub estimated_time_minutes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStatusResponse {
    pub session_id: String,
    pub status: SessionStatus,
    pub subject: String,
    pub created_at: DateTime<Utc>,
    pub elapsed_seconds: i64,
    pub error_message: Option<String>,
}

impl From<&QuizSession> for QuizStatusResponse {
    fn from(session: &QuizSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            status: session.status,
            subject: session.subject.clone(),
            created_at: session.created_at,
            elapsed_seconds: crate::utils::time::seconds_since(session.created_at),
            error_message: session.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    pub user_id: Option<String>,
    #[validate(length(min = 1, message = "quiz_id is required"))]
    pub quiz_id: String,
    #[validate(custom(function = "answer_keys"))]
    pub answers: BTreeMap<String, String>,
}

impl From<SubmitAnswersRequest> for UserAnswerSet {
    fn from(req: SubmitAnswersRequest) -> Self {
        let user_id = req
            .user_id
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| "anonymous".to_string());
        UserAnswerSet {
            user_id,
            quiz_id: req.quiz_id,
            answers: req.answers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    pub subject: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub sessions: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectsResponse {
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HintRequest {
    #[validate(length(min = 1, message = "question is required"))]
    pub question: String,
    #[validate(length(min = 1, message = "correct_answer is required"))]
    pub correct_answer: String,
    #[serde(default)]
    pub user_answer: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub topic: String,
}

impl From<HintRequest> for HintQuery {
    fn from(req: HintRequest) -> Self {
        HintQuery {
            question: req.question,
            correct_answer: req.correct_answer,
            user_answer: req.user_answer,
            difficulty: req.difficulty,
            topic: req.topic,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResourcesQuery {
    #[validate(length(min = 1, message = "topic is required"))]
    pub topic: String,
    pub question_type: Option<String>,
    /// Comma separated StackOverflow tags.
    pub tags: Option<String>,
}

impl ResourcesQuery {
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}
