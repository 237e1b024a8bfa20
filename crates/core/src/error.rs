//! Unified error handling for the NLU service.
//!
//! A single error type shared by all crates keeps error handling consistent
//! and avoids per-crate wrapper enums.

/// Unified error type for the NLU service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors (malformed documents, missing files).
    #[error("configuration error: {0}")]
    Config(String),

    /// A pattern template referenced a vocabulary group that does not exist.
    #[error("unknown vocabulary group: {0}")]
    UnknownVocabularyGroup(String),

    /// A rule pattern failed to expand or compile.
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Embedding provider errors (HTTP failures, malformed responses).
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Filesystem errors.
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Convenience constructors for common errors
impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let e = Error::UnknownVocabularyGroup("action_open".to_string());
        assert_eq!(e.to_string(), "unknown vocabulary group: action_open");

        let e = Error::pattern("{{bad}}", "no such group");
        assert_eq!(e.to_string(), "invalid pattern '{{bad}}': no such group");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
