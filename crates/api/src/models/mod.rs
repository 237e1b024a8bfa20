//! Request and response models for the web API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod error;

pub use error::ErrorResponse;

/// Standard response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Error message when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server-side timestamp.
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    /// Successful response wrapping `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }
}

/// Recognition request body.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentRequest {
    /// The text to recognize.
    pub text: String,
    /// Optional pre-committed domain; skips domain classification.
    #[serde(default)]
    pub domain: Option<String>,
    /// Optional context payload (accepted for interface parity).
    #[serde(default)]
    pub context: Option<serde_json::Value>,
    /// Optional session id for multi-turn callers.
    #[serde(default)]
    pub session_id: Option<String>,
}
