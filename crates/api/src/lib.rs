//! HTTP surface for the NLU service.
//!
//! Exposes intent recognition and domain classification over a small REST
//! API, with the usual `{success, data, error, timestamp}` envelope.

pub mod handlers;
pub mod models;
pub mod server;

pub use models::{ApiResponse, ErrorResponse, IntentRequest};
pub use server::{create_router_with_state, run, ServerState};
