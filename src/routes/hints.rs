use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::dto::quiz_dto::{HintRequest, ResourcesQuery};
use crate::error::Result;
use crate::services::hint_service::HintQuery;
use crate::AppState;

#[axum::debug_handler]
pub async fn hints(
    State(state): State<AppState>,
    Json(payload): Json<HintRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let query = HintQuery::from(payload);
    Ok(Json(state.hint_service.hints(&query).await))
}

#[axum::debug_handler]
pub async fn resources(
    State(state): State<AppState>,
    Query(params): Query<ResourcesQuery>,
) -> Result<impl IntoResponse> {
    params.validate()?;
    let question_type = params.question_type.as_deref().unwrap_or("general");
    let resources = state
        .hint_service
        .learning_resources(&params.topic, question_type, &params.tag_list())
        .await;
    Ok(Json(resources))
}
