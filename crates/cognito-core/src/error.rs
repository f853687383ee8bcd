//! Error types for the Cognito backend.

use thiserror::Error;

/// Result type alias using Cognito's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Cognito operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Provider answered HTTP 429
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry with backoff may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    /// Whether the error originated in an LLM provider call.
    pub fn is_inference(&self) -> bool {
        matches!(
            self,
            Error::Inference(_) | Error::RateLimited(_) | Error::Request(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
