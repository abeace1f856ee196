use axum::{routing::get, Router};
use quern_engine::EngineService;
use std::sync::Arc;

/// Shared state for the HTTP listener — passed as `Arc<AppState>` to handlers.
pub struct AppState {
    pub engine: Arc<EngineService>,
}

/// Assemble the Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::health::health_handler))
        .with_state(state)
}
