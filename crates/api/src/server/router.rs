//! Application router configuration.

use axum::{
    routing::{get, post},
    Router,
};

use super::types::{ServerState, MAX_REQUEST_BODY_SIZE};
use crate::handlers::{basic, nlu};

/// Create the application router with the given state.
pub fn create_router_with_state(state: ServerState) -> Router {
    Router::new()
        .route("/api/health", get(basic::health_handler))
        .route("/api/v1/nlu/intent", post(nlu::recognize_intent_handler))
        .route("/api/v1/nlu/domain", post(nlu::classify_domain_handler))
        .route("/api/v1/nlu/info", get(nlu::engine_info_handler))
        .route("/api/v1/nlu/cache/clear", post(nlu::clear_cache_handler))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            MAX_REQUEST_BODY_SIZE,
        ))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
