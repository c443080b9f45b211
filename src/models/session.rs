use crate::models::evaluation::EvaluationResult;
use crate::models::question::Quiz;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Generating,
    Ready,
    Evaluating,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Generating => "generating",
            SessionStatus::Ready => "ready",
            SessionStatus::Evaluating => "evaluating",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Generating, Ready)
                | (Generating, Failed)
                | (Ready, Evaluating)
                | (Evaluating, Completed)
                | (Evaluating, Ready)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSession {
    pub session_id: String,
    pub subject: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz: Option<Quiz>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<EvaluationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl QuizSession {
    pub fn generating(session_id: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            subject: subject.into(),
            status: SessionStatus::Generating,
            created_at: crate::utils::time::now(),
            quiz: None,
            results: None,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_sessions_are_terminal() {
        for next in [
            SessionStatus::Generating,
            SessionStatus::Ready,
            SessionStatus::Evaluating,
            SessionStatus::Failed,
        ] {
            assert!(!SessionStatus::Completed.can_transition_to(next));
        }
        assert!(SessionStatus::Evaluating.can_transition_to(SessionStatus::Ready));
        assert!(!SessionStatus::Generating.can_transition_to(SessionStatus::Evaluating));
    }
}
