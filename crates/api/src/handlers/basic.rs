//! Health check handlers.

use axum::extract::State;
use axum::response::Json;
use serde_json::json;

use crate::server::ServerState;

/// Liveness probe.
///
/// GET /api/health
pub async fn health_handler(State(state): State<ServerState>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now().timestamp() - state.started_at;
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
    }))
}
