pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::{
    ai_service::AIService,
    eval_service::EvalService,
    hint_service::HintService,
    llm_service::{build_backend, LlmBackend},
    session_service::{InMemorySessionStore, SessionStore},
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};

const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ai_service: AIService,
    pub eval_service: EvalService,
    pub hint_service: HintService,
    pub sessions: Arc<dyn SessionStore>,
}

impl AppState {
    pub fn new(config: &Config) -> error::Result<Self> {
        let http_client = Self::http_client(config)?;
        let backend = build_backend(config, http_client.clone())?;
        Ok(Self::assemble(config, backend, HintService::new(http_client)))
    }

    /// State around an explicit model backend and hint service.
    pub fn with_backend(config: &Config, backend: Arc<dyn LlmBackend>, hint_service: HintService) -> Self {
        Self::assemble(config, backend, hint_service)
    }

    fn http_client(config: &Config) -> error::Result<Client> {
        // Leave headroom over the model timeout so the orchestrator's own
        // deadline fires first.
        Ok(Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs + 5))
            .build()?)
    }

    fn assemble(config: &Config, backend: Arc<dyn LlmBackend>, hint_service: HintService) -> Self {
        let llm_timeout = Duration::from_secs(config.llm_timeout_secs);
        Self {
            config: Arc::new(config.clone()),
            ai_service: AIService::new(backend.clone(), llm_timeout),
            eval_service: EvalService::new(backend, llm_timeout),
            hint_service,
            sessions: Arc::new(InMemorySessionStore::new()),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/subjects", get(routes::quiz::list_subjects))
        .route("/generate-quiz", post(routes::quiz::generate_quiz))
        .route("/quiz-status/:id", get(routes::quiz::quiz_status))
        .route("/quiz/:id", get(routes::quiz::get_quiz))
        .route("/submit-answers", post(routes::quiz::submit_answers))
        .route("/results/:id", get(routes::quiz::get_results))
        .route("/history", get(routes::quiz::history))
        .route("/sessions/:id", delete(routes::quiz::delete_session))
        .route("/hints", post(routes::hints::hints))
        .route("/resources", get(routes::hints::resources))
        .route("/progress", post(routes::progress::progress))
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::RateLimiter::new(config.public_rps),
            middleware::rate_limit::rps_middleware,
        ));

    Router::new()
        .route("/", get(routes::health::health))
        .route("/health", get(routes::health::health))
        .merge(api)
        .with_state(state)
        .layer(middleware::cors::cors_layer(&config.cors_origins))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
