//! Server state and types.

use std::sync::Arc;

use nlu_engine::NluEngine;

/// Maximum request body size (1 MB). Utterances are short.
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Server state shared across all handlers.
#[derive(Clone)]
pub struct ServerState {
    /// The recognition pipeline.
    pub engine: Arc<NluEngine>,
    /// Server start timestamp.
    pub started_at: i64,
}

impl ServerState {
    pub fn new(engine: Arc<NluEngine>) -> Self {
        Self {
            engine,
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}
