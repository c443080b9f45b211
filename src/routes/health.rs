use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::services::ai_service::SUBJECTS;

#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let body = json!({
        "status": "healthy",
        "message": "QuizFlow API is running!",
        "version": env!("CARGO_PKG_VERSION"),
        "subjects_available": SUBJECTS.len(),
    });
    (StatusCode::OK, Json(body))
}
