use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::llm_client::ResponseMode;
use crate::state::AppState;

/// GET /health
/// Liveness plus the active prompt version, so deployments can tell which schema they serve.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let settings = state.analyzer.settings();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "resume-analyzer",
        "promptVersion": settings.variant.version(),
        "streaming": settings.mode == ResponseMode::Streamed
    }))
}
