use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health — liveness probe, returns server metadata and engine gauges.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let counters = state.engine.counters();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "buffered_conversations": counters.buffered_conversations,
        "seen_events": counters.seen_events,
        "answer_contexts": counters.answer_contexts,
    }))
}
