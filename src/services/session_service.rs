use crate::models::evaluation::EvaluationResult;
use crate::models::question::Quiz;
use crate::models::session::{QuizSession, SessionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Session {0} not found")]
    NotFound(String),

    #[error("Session {id} is {actual}, expected {expected}")]
    WrongStatus {
        id: String,
        expected: SessionStatus,
        actual: SessionStatus,
    },

    #[error("Session cannot move from {from} to {to}")]
    Illegal { from: SessionStatus, to: SessionStatus },
}

/// Fields written together with a status change.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub quiz: Option<Quiz>,
    pub results: Option<EvaluationResult>,
    pub error_message: Option<String>,
}

impl SessionPatch {
    pub fn quiz(quiz: Quiz) -> Self {
        Self { quiz: Some(quiz), ..Default::default() }
    }

    pub fn results(results: EvaluationResult) -> Self {
        Self { results: Some(results), ..Default::default() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { error_message: Some(message.into()), ..Default::default() }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<QuizSession>;
    async fn put(&self, session: QuizSession);
    async fn delete(&self, id: &str) -> bool;
    /// All sessions, newest first.
    async fn list(&self) -> Vec<QuizSession>;
    /// Moves a session from `from` to `to` and applies `patch`, or changes
    /// nothing.
    async fn transition(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
        patch: SessionPatch,
    ) -> Result<QuizSession, TransitionError>;
}

/// Process-scoped store; contents are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, QuizSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &str) -> Option<QuizSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn put(&self, session: QuizSession) {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session);
    }

    async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn list(&self) -> Vec<QuizSession> {
        let mut sessions: Vec<QuizSession> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    async fn transition(
        &self,
        id: &str,
        from: SessionStatus,
        to: SessionStatus,
        patch: SessionPatch,
    ) -> Result<QuizSession, TransitionError> {
        if !from.can_transition_to(to) {
            return Err(TransitionError::Illegal { from, to });
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| TransitionError::NotFound(id.to_string()))?;
        if session.status != from {
            return Err(TransitionError::WrongStatus {
                id: id.to_string(),
                expected: from,
                actual: session.status,
            });
        }

        session.status = to;
        if let Some(quiz) = patch.quiz {
            session.quiz = Some(quiz);
        }
        if let Some(results) = patch.results {
            session.results = Some(results);
        }
        if patch.error_message.is_some() {
            session.error_message = patch.error_message;
        }
        tracing::debug!(session_id = id, %from, %to, "Session transitioned");
        Ok(session.clone())
    }
}
