pub mod config;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod relay;
pub mod routes;
pub mod services;
pub mod store;
pub mod sync;
pub mod video;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::relay::RoomRegistry;
use crate::services::execution_client::ExecutionClient;
use crate::services::interview_service::InterviewService;
use crate::services::token_service::MediaTokenService;
use crate::store::InterviewStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn InterviewStore>,
    pub interview_service: InterviewService,
    pub rooms: Arc<RoomRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn InterviewStore>) -> Self {
        let config = crate::config::get_config();

        let execution = Arc::new(ExecutionClient::new(
            config.execution_backend_url.clone(),
            config.execution_timeout_secs,
        ));
        let rooms = Arc::new(RoomRegistry::new(Arc::clone(&store), execution));
        let tokens = MediaTokenService::new(
            config.media_token_secret.clone(),
            config.media_token_ttl_secs,
        );
        let interview_service =
            InterviewService::new(Arc::clone(&store), tokens, Arc::clone(&rooms));

        Self {
            store,
            interview_service,
            rooms,
        }
    }
}

/// Full API router; shared by the binary and the test suite.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health))
        .route(
            "/api/interviews",
            get(routes::interviews::list_interviews).post(routes::interviews::schedule_interview),
        )
        .route("/api/interviews/:id", get(routes::interviews::get_interview))
        .route(
            "/api/interviews/:id/join",
            post(routes::interviews::join_interview),
        )
        .route(
            "/api/interviews/:id/participants",
            post(routes::interviews::add_participant),
        )
        .route(
            "/api/interviews/:id/status",
            post(routes::interviews::update_status),
        )
        .route(
            "/api/interviews/:id/cancel",
            post(routes::interviews::cancel_interview),
        )
        .route(
            "/api/interviews/:id/evaluations",
            get(routes::interviews::list_evaluations).post(routes::interviews::submit_evaluation),
        )
        .route(
            "/api/interviews/:id/notes",
            get(routes::interviews::list_notes).post(routes::interviews::add_note),
        )
        .route(
            "/api/interviews/:id/session",
            get(relay::gateway::session_ws),
        )
        .with_state(state)
}
