//! NLU recognition handlers.

use axum::extract::State;
use axum::response::Json;
use serde_json::json;

use nlu_core::{DomainPrediction, IntentData};
use nlu_engine::EngineInfo;

use crate::models::{ApiResponse, IntentRequest};
use crate::server::ServerState;

/// Two-stage intent recognition.
///
/// POST /api/v1/nlu/intent
///
/// Races the global regex pass, domain classification plus domain-restricted
/// regex, and the embedding intent matcher; returns the first acceptable
/// result. Empty text and unrecognizable text both yield a successful
/// `none` result, not an error.
pub async fn recognize_intent_handler(
    State(state): State<ServerState>,
    Json(request): Json<IntentRequest>,
) -> Json<ApiResponse<IntentData>> {
    let result = state
        .engine
        .recognize(
            &request.text,
            request.domain.as_deref(),
            request.context,
            request.session_id.as_deref(),
        )
        .await;
    Json(ApiResponse::ok(result))
}

/// Standalone domain classification.
///
/// POST /api/v1/nlu/domain
pub async fn classify_domain_handler(
    State(state): State<ServerState>,
    Json(request): Json<IntentRequest>,
) -> Json<ApiResponse<DomainPrediction>> {
    let prediction = state.engine.classify_domain(&request.text).await;
    Json(ApiResponse::ok(prediction))
}

/// Engine information: supported domains, rule and intent counts, cache
/// occupancy.
///
/// GET /api/v1/nlu/info
pub async fn engine_info_handler(
    State(state): State<ServerState>,
) -> Json<ApiResponse<EngineInfo>> {
    Json(ApiResponse::ok(state.engine.info().await))
}

/// Drop the prediction caches.
///
/// POST /api/v1/nlu/cache/clear
pub async fn clear_cache_handler(
    State(state): State<ServerState>,
) -> Json<ApiResponse<serde_json::Value>> {
    state.engine.clear_caches().await;
    Json(ApiResponse::ok(json!({"cleared": true})))
}
