use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use quizflow_backend::{
    app,
    config::Config,
    services::hint_service::HintService,
    services::llm_service::{GenerateOptions, LlmBackend, LlmError, LlmProvider},
    AppState,
};
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

/// Replays canned model outputs in order, optionally after a delay.
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    delay: Duration,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<String, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    async fn generate(&self, _prompt: &str, _options: &GenerateOptions) -> Result<String, LlmError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse(LlmProvider::OpenAi)))
    }
}

fn quiz_output() -> String {
    let doc = json!({
        "quiz_metadata": {"subject": "Computer Science", "total_questions": 4},
        "questions": [
            {"id": "q1", "type": "multiple_choice", "difficulty": "Easy", "topic": "Algorithms",
             "question": "What is the time complexity of binary search?",
             "options": ["O(n)", "O(log n)", "O(1)", "O(n^2)"], "correct_answer": "B",
             "explanation": "The search space halves each step."},
            {"id": "q2", "type": "multiple_choice", "difficulty": "Easy", "topic": "Networks",
             "question": "Which port does HTTPS use by default?",
             "options": ["80", "443", "21", "22"], "correct_answer": "443"},
            {"id": "q3", "type": "true_false", "difficulty": "Medium", "topic": "Algorithms",
             "question": "Quicksort always runs in O(n log n).", "correct_answer": "False"},
            {"id": "q4", "type": "short_answer", "difficulty": "Hard", "topic": "Databases",
             "question": "What does ACID stand for?",
             "correct_answer": "Atomicity, Consistency, Isolation, Durability"}
        ]
    });
    format!("```json\n{}\n```", doc)
}

fn evaluation_output(points: &[f64]) -> String {
    let results: Vec<JsonValue> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            json!({
                "question_id": format!("q{}", i + 1),
                "user_answer": "answer",
                "correct_answer": "answer",
                "is_correct": *p == 1.0,
                "points_awarded": p,
                "feedback": "Reviewed."
            })
        })
        .collect();
    json!({
        "quiz_results": {
            "overall_score": {"points_earned": 4, "total_points": 4, "percentage": 100, "grade": "A"},
            "question_results": results,
            "recommendations": ["Revisit sorting algorithm worst cases"]
        }
    })
    .to_string()
}

fn state(backend: ScriptedBackend) -> AppState {
    let config = Config {
        public_rps: 10_000,
        llm_timeout_secs: 5,
        ..Config::default()
    };
    let hints = HintService::with_base_urls(Client::new(), "http://127.0.0.1:9/w/api.php", "http://127.0.0.1:9/2.3");
    AppState::with_backend(&config, Arc::new(backend), hints)
}

async fn send(state: &AppState, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
    (status, json)
}

async fn start_quiz(state: &AppState) -> String {
    let (status, body) = send(
        state,
        "POST",
        "/generate-quiz",
        Some(json!({"subject": "Computer Science", "num_questions": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "generating");
    body["session_id"].as_str().unwrap().to_string()
}

async fn wait_for_status(state: &AppState, session_id: &str, expected: &str) {
    for _ in 0..200 {
        let (_, body) = send(state, "GET", &format!("/quiz-status/{}", session_id), None).await;
        if body["status"] == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session {} never reached {}", session_id, expected);
}

#[tokio::test]
async fn quiz_flow_end_to_end() {
    let state = state(ScriptedBackend::new(vec![
        Ok(quiz_output()),
        Ok(evaluation_output(&[1.0, 0.0, 0.5, 1.0])),
    ]));

    let (status, health) = send(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["subjects_available"], 11);

    let session_id = start_quiz(&state).await;
    wait_for_status(&state, &session_id, "ready").await;

    let (status, quiz) = send(&state, "GET", &format!("/quiz/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 4);
    assert_eq!(quiz["questions"][0]["correct_answer"], "O(log n)");
    assert_eq!(quiz["quiz_metadata"]["difficulty_distribution"]["Easy"], 2);

    let submission = json!({
        "user_id": "learner-1",
        "quiz_id": session_id,
        "answers": {"q1": "O(log n)", "q2": "80", "q3": "True"}
    });
    let (status, result) = send(&state, "POST", "/submit-answers", Some(submission.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["overall_score"]["points_earned"], 2.5);
    assert_eq!(result["overall_score"]["total_points"], 4);
    assert_eq!(result["overall_score"]["percentage"], 62.5);
    assert_eq!(result["overall_score"]["grade"], "D");
    assert_eq!(result["user_id"], "learner-1");
    assert_eq!(result["performance_by_difficulty"]["Easy"]["total"], 2);
    assert_eq!(result["performance_by_topic"][0]["topic"], "Algorithms");

    let (status, stored) = send(&state, "GET", &format!("/results/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["overall_score"], result["overall_score"]);

    let (status, _) = send(&state, "POST", "/submit-answers", Some(submission)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, history) = send(&state, "GET", "/history", None).await;
    assert_eq!(history["sessions"][0]["status"], "completed");

    let (status, progress) = send(
        &state,
        "POST",
        "/progress",
        Some(json!({"action": "get_user_progress", "user_id": "learner-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["quizzes_taken"], 1);
    assert_eq!(progress["best_grade"], "D");

    let (status, _) = send(&state, "DELETE", &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&state, "DELETE", &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quiz_is_accepted_while_generating() {
    let state = state(ScriptedBackend::new(vec![Ok(quiz_output())]).delayed(Duration::from_millis(300)));
    let session_id = start_quiz(&state).await;

    let (status, body) = send(&state, "GET", &format!("/quiz/{}", session_id), None).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "generating");

    let (status, _) = send(
        &state,
        "POST",
        "/submit-answers",
        Some(json!({"quiz_id": session_id, "answers": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_generation_is_reported() {
    let state = state(ScriptedBackend::new(vec![Ok("I cannot help with that.".to_string())]));
    let session_id = start_quiz(&state).await;
    wait_for_status(&state, &session_id, "failed").await;

    let (_, status_body) = send(&state, "GET", &format!("/quiz-status/{}", session_id), None).await;
    assert!(status_body["error_message"].as_str().unwrap().contains("Malformed"));

    let (status, _) = send(&state, "GET", &format!("/quiz/{}", session_id), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn model_outage_keeps_session_open_for_retry() {
    let state = state(ScriptedBackend::new(vec![
        Ok(quiz_output()),
        Err(LlmError::Api {
            provider: LlmProvider::OpenAi,
            status: 503,
            body: "overloaded".to_string(),
        }),
        Ok(evaluation_output(&[1.0, 1.0, 1.0, 1.0])),
    ]));
    let session_id = start_quiz(&state).await;
    wait_for_status(&state, &session_id, "ready").await;

    let submission = json!({"quiz_id": session_id, "answers": {"q1": "O(log n)"}});
    let (status, body) = send(&state, "POST", "/submit-answers", Some(submission.clone())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "model_unavailable");

    let (_, status_body) = send(&state, "GET", &format!("/quiz-status/{}", session_id), None).await;
    assert_eq!(status_body["status"], "ready");

    let (status, result) = send(&state, "POST", "/submit-answers", Some(submission)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["overall_score"]["grade"], "A");
    assert_eq!(result["user_id"], "anonymous");
}

#[tokio::test]
async fn dropped_submission_still_settles_session() {
    let state = state(
        ScriptedBackend::new(vec![Ok(quiz_output()), Ok(evaluation_output(&[1.0, 1.0, 0.0, 1.0]))])
            .delayed(Duration::from_millis(200)),
    );
    let session_id = start_quiz(&state).await;
    wait_for_status(&state, &session_id, "ready").await;

    let submission = json!({"quiz_id": session_id, "answers": {"q1": "O(log n)"}});
    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        send(&state, "POST", "/submit-answers", Some(submission.clone())),
    )
    .await;
    assert!(dropped.is_err());

    wait_for_status(&state, &session_id, "completed").await;
    let (status, result) = send(&state, "GET", &format!("/results/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["overall_score"]["points_earned"], 3.0);

    let (status, _) = send(&state, "POST", "/submit-answers", Some(submission)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_evaluation_is_bad_gateway() {
    let state = state(ScriptedBackend::new(vec![
        Ok(quiz_output()),
        Ok(r#"{"quiz_results": {"question_results": [{"question_id": "q1", "points_awarded": 0.7}]}}"#.to_string()),
    ]));
    let session_id = start_quiz(&state).await;
    wait_for_status(&state, &session_id, "ready").await;

    let (status, body) = send(
        &state,
        "POST",
        "/submit-answers",
        Some(json!({"quiz_id": session_id, "answers": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "malformed_response");
    assert!(!body["error"].as_str().unwrap().contains("quiz_results"));
}

#[tokio::test]
async fn request_errors() {
    let state = state(ScriptedBackend::new(vec![]));

    let (status, _) = send(&state, "POST", "/generate-quiz", Some(json!({"subject": "Astrology"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &state,
        "POST",
        "/submit-answers",
        Some(json!({"quiz_id": "missing", "answers": {"q1": "a"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&state, "GET", "/results/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, subjects) = send(&state, "GET", "/subjects", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subjects["subjects"].as_array().unwrap().len(), 11);

    let (status, board) = send(&state, "POST", "/progress", Some(json!({"action": "get_leaderboard"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(board["leaderboard"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn hints_degrade_without_external_sources() {
    let state = state(ScriptedBackend::new(vec![]));
    let (status, body) = send(
        &state,
        "POST",
        "/hints",
        Some(json!({
            "question": "Which algorithm finds shortest paths with non-negative weights?",
            "correct_answer": "Dijkstra",
            "user_answer": "Prim",
            "difficulty": "Hard",
            "topic": "Algorithms"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progressive_hints"].as_array().unwrap().len(), 5);
    assert!(body["learning_resources"]["wikipedia_content"].is_null());

    let (status, resources) = send(&state, "GET", "/resources?topic=Recursion&question_type=coding&tags=python", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resources["additional_resources"].as_array().unwrap().len(), 6);
}
