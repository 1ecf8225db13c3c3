//! Error types for the fortune-teller share service.

use thiserror::Error;

/// Result type alias using the service-wide Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP statuses that mark an upstream failure as transient.
///
/// Request timeout, conflict and rate limiting, plus every 5xx.
pub fn is_retriable_status(status: u16) -> bool {
    matches!(status, 408 | 409 | 429 | 500..=599)
}

/// Core error type for share service operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Share record not found
    #[error("Share not found: {0}")]
    ShareNotFound(String),

    /// Document store I/O failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Generation failed permanently (malformed body, missing fields, rejected request)
    #[error("Inference error: {0}")]
    Inference(String),

    /// Upstream answered with a non-success HTTP status
    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    /// Upstream call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Upstream could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// Upstream answered successfully but without any text
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed for a reason that is not transient
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Timeouts, connection failures, empty completions and upstream
    /// statuses in the retriable set qualify. Everything else aborts.
    pub fn is_retriable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::Connection(_) | Error::EmptyResponse(_) => true,
            Error::UpstreamStatus { status, .. } => is_retriable_status(*status),
            _ => false,
        }
    }

    /// Whether this error means the addressed share does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ShareNotFound(_) | Error::NotFound(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::Connection(e.to_string())
        } else if let Some(status) = e.status() {
            Error::UpstreamStatus {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Error::Request(e.to_string())
        }
    }
}
