use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use crate::services::session_service::TransitionError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

/// Longest slice of raw model output kept for diagnostics.
pub const RESPONSE_PREFIX_LIMIT: usize = 200;

/// Bounded, char-boundary safe prefix of raw model output.
pub fn response_prefix(raw: &str) -> String {
    match raw.char_indices().nth(RESPONSE_PREFIX_LIMIT) {
        Some((idx, _)) => format!("{}...", &raw[..idx]),
        None => raw.to_string(),
    }
}

/// Failures of the answer-evaluation pipeline. Callers receive exactly one of
/// these instead of a partial result.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Malformed model response: {reason}")]
    MalformedResponse { reason: String, prefix: String },

    #[error("Reconciliation failed: {0}")]
    Reconciliation(String),
}

impl EvaluationError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        EvaluationError::MalformedResponse {
            reason: reason.into(),
            prefix: response_prefix(raw),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EvaluationError::InvalidInput(_) => "invalid_input",
            EvaluationError::ModelUnavailable(_) => "model_unavailable",
            EvaluationError::MalformedResponse { .. } => "malformed_response",
            EvaluationError::Reconciliation(_) => "reconciliation_error",
        }
    }

    /// Only transport-level model failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EvaluationError::ModelUnavailable(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            EvaluationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EvaluationError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EvaluationError::MalformedResponse { .. } => StatusCode::BAD_GATEWAY,
            EvaluationError::Reconciliation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Malformed model response: {reason}")]
    MalformedResponse { reason: String, prefix: String },
}

impl GenerationError {
    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        GenerationError::MalformedResponse {
            reason: reason.into(),
            prefix: response_prefix(raw),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::ModelUnavailable(_) => "model_unavailable",
            GenerationError::MalformedResponse { .. } => "malformed_response",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, kind) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            Error::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::Json(err) => (StatusCode::BAD_REQUEST, err.to_string(), None),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                format!("External service error: {}", err),
                None,
            ),
            Error::Evaluation(err) => {
                match &err {
                    EvaluationError::MalformedResponse { reason, prefix } => {
                        tracing::warn!(reason = %reason, response_prefix = %prefix, "Malformed evaluation response");
                    }
                    EvaluationError::Reconciliation(msg) => {
                        tracing::error!(error = %msg, "Score reconciliation invariant violated");
                    }
                    _ => {}
                }
                (err.status(), err.to_string(), Some(err.kind()))
            }
            Error::Generation(err) => (StatusCode::BAD_GATEWAY, err.to_string(), Some(err.kind())),
            Error::Transition(err) => {
                let status = match &err {
                    TransitionError::NotFound(_) => StatusCode::NOT_FOUND,
                    TransitionError::WrongStatus { .. } => StatusCode::BAD_REQUEST,
                    TransitionError::Illegal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string(), None)
            }
            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg, None)
            }
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred".to_string(),
                None,
            ),
        };

        let body = match kind {
            Some(kind) => json!({ "error": error_message, "kind": kind }),
            None => json!({ "error": error_message }),
        };
        (status, Json(body)).into_response()
    }
}
