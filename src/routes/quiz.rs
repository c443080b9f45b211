use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use validator::Validate;

use crate::dto::quiz_dto::{
    GenerateQuizRequest, GenerateQuizResponse, HistoryEntry, HistoryResponse, MessageResponse,
    QuizStatusResponse, SubjectsResponse, SubmitAnswersRequest,
};
use crate::error::{Error, EvaluationError, Result};
use crate::models::answer::UserAnswerSet;
use crate::models::evaluation::EvaluationResult;
use crate::models::question::{estimated_minutes, Quiz};
use crate::models::session::{QuizSession, SessionStatus};
use crate::services::ai_service::{subject_includes_coding, SUBJECTS};
use crate::services::session_service::SessionPatch;
use crate::AppState;

async fn find_session(state: &AppState, id: &str) -> Result<QuizSession> {
    state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| Error::NotFound("Session not found".to_string()))
}

#[axum::debug_handler]
pub async fn list_subjects() -> impl IntoResponse {
    Json(SubjectsResponse {
        subjects: SUBJECTS.iter().map(|s| s.to_string()).collect(),
    })
}

#[axum::debug_handler]
pub async fn generate_quiz(
    State(state): State<AppState>,
    Json(payload): Json<GenerateQuizRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let subject = payload.subject.clone();
    let difficulty = payload.difficulty.unwrap_or_default();
    let num_questions = payload.num_questions.unwrap_or(state.config.quiz_question_count);
    let include_coding = payload
        .include_coding
        .unwrap_or_else(|| subject_includes_coding(&subject));

    state
        .sessions
        .put(QuizSession::generating(session_id.clone(), subject.clone()))
        .await;
    tracing::info!(session_id = %session_id, subject = %subject, "Quiz generation started");

    {
        let state = state.clone();
        let session_id = session_id.clone();
        let subject = subject.clone();
        tokio::spawn(async move {
            let outcome = state
                .ai_service
                .generate_quiz(&subject, difficulty, num_questions, include_coding)
                .await;
            let (to, patch) = match outcome {
                Ok(mut quiz) => {
                    quiz.id = Some(session_id.clone());
                    (SessionStatus::Ready, SessionPatch::quiz(quiz))
                }
                Err(e) => {
                    tracing::error!(session_id = %session_id, kind = e.kind(), error = %e, "Quiz generation failed");
                    (SessionStatus::Failed, SessionPatch::error(e.to_string()))
                }
            };
            if let Err(e) = state
                .sessions
                .transition(&session_id, SessionStatus::Generating, to, patch)
                .await
            {
                tracing::warn!(session_id = %session_id, error = %e, "Dropping generated quiz");
            } else {
                tracing::info!(session_id = %session_id, status = %to, "Quiz generation finished");
            }
        });
    }

    Ok(Json(GenerateQuizResponse {
        session_id,
        status: SessionStatus::Generating,
        message: format!("Quiz generation started for {}", subject),
        estimated_time_minutes: estimated_minutes(num_questions),
    }))
}

#[axum::debug_handler]
pub async fn quiz_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let session = find_session(&state, &session_id).await?;
    Ok(Json(QuizStatusResponse::from(&session)))
}

#[axum::debug_handler]
pub async fn get_quiz(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response> {
    let session = find_session(&state, &session_id).await?;
    match session.status {
        SessionStatus::Generating => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "status": session.status,
                "message": "Quiz still generating"
            })),
        )
            .into_response()),
        SessionStatus::Failed => Err(Error::Internal(format!(
            "Generation failed: {}",
            session.error_message.unwrap_or_default()
        ))),
        _ => session
            .quiz
            .map(|quiz| Json(quiz).into_response())
            .ok_or_else(|| Error::NotFound("Quiz data not found".to_string())),
    }
}

#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Json(payload): Json<SubmitAnswersRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let answers = UserAnswerSet::from(payload);

    let session = find_session(&state, &answers.quiz_id).await?;
    if session.status != SessionStatus::Ready {
        return Err(Error::BadRequest(format!("Quiz not ready (status: {})", session.status)));
    }

    // Claims the session; a concurrent submission loses here.
    let session = state
        .sessions
        .transition(
            &answers.quiz_id,
            SessionStatus::Ready,
            SessionStatus::Evaluating,
            SessionPatch::default(),
        )
        .await?;
    let quiz = session
        .quiz
        .ok_or_else(|| Error::Internal(format!("Session {} is ready without a quiz", answers.quiz_id)))?;

    // Evaluation and the status update run detached so a dropped request
    // still settles the session.
    let task_state = state.clone();
    let evaluation = tokio::spawn(async move { settle_evaluation(task_state, quiz, answers).await });
    let result = evaluation
        .await
        .map_err(|e| Error::Internal(format!("Evaluation task failed: {}", e)))??;
    Ok(Json(result))
}

async fn settle_evaluation(
    state: AppState,
    quiz: Quiz,
    answers: UserAnswerSet,
) -> std::result::Result<EvaluationResult, EvaluationError> {
    match state.eval_service.evaluate(&quiz, &answers).await {
        Ok(result) => {
            if let Err(e) = state
                .sessions
                .transition(
                    &answers.quiz_id,
                    SessionStatus::Evaluating,
                    SessionStatus::Completed,
                    SessionPatch::results(result.clone()),
                )
                .await
            {
                tracing::warn!(session_id = %answers.quiz_id, error = %e, "Could not store evaluation result");
            }
            Ok(result)
        }
        Err(e) => {
            if let Err(revert) = state
                .sessions
                .transition(
                    &answers.quiz_id,
                    SessionStatus::Evaluating,
                    SessionStatus::Ready,
                    SessionPatch::default(),
                )
                .await
            {
                tracing::warn!(session_id = %answers.quiz_id, error = %revert, "Could not reopen session after failed evaluation");
            }
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn get_results(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    let session = find_session(&state, &session_id).await?;
    if session.status != SessionStatus::Completed {
        return Err(Error::BadRequest("Quiz not completed yet".to_string()));
    }
    session
        .results
        .map(Json)
        .ok_or_else(|| Error::NotFound("Results not found".to_string()))
}

#[axum::debug_handler]
pub async fn history(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state
        .sessions
        .list()
        .await
        .into_iter()
        .map(|s| HistoryEntry {
            session_id: s.session_id,
            subject: s.subject,
            status: s.status,
            created_at: s.created_at,
        })
        .collect();
    Json(HistoryResponse { sessions })
}

#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse> {
    if !state.sessions.delete(&session_id).await {
        return Err(Error::NotFound("Session not found".to_string()));
    }
    tracing::info!(session_id = %session_id, "Session deleted");
    Ok(Json(MessageResponse {
        message: "Session deleted".to_string(),
    }))
}
