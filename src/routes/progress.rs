use axum::{extract::State, response::IntoResponse, Json};

use crate::error::{Error, Result};
use crate::services::progress_service::{ProgressAction, ProgressService};
use crate::AppState;

const MAX_LEADERBOARD: usize = 100;

#[axum::debug_handler]
pub async fn progress(
    State(state): State<AppState>,
    Json(action): Json<ProgressAction>,
) -> Result<impl IntoResponse> {
    let action = match action {
        ProgressAction::GetUserProgress { user_id } if user_id.trim().is_empty() => {
            return Err(Error::BadRequest("user_id is required".to_string()));
        }
        ProgressAction::GetSubjectPerformance { subject } if subject.trim().is_empty() => {
            return Err(Error::BadRequest("subject is required".to_string()));
        }
        ProgressAction::GetLeaderboard { limit } => ProgressAction::GetLeaderboard {
            limit: limit.clamp(1, MAX_LEADERBOARD),
        },
        other => other,
    };

    let sessions = state.sessions.list().await;
    Ok(Json(ProgressService::run(&action, &sessions)))
}
