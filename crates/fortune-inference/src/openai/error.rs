//! OpenAI-specific error handling.

use fortune_core::Error;

/// OpenAI-specific error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    /// Invalid authentication credentials.
    AuthenticationError,
    /// Rate limit exceeded.
    RateLimitExceeded,
    /// Model not found or not available.
    ModelNotFound,
    /// Request too large.
    ContextLengthExceeded,
    /// Request timed out or conflicted upstream.
    Transient,
    /// Server error.
    ServerError,
    /// Unknown error.
    Unknown,
}

impl OpenAIErrorCode {
    /// Determine error code from HTTP status and error type.
    pub fn from_response(status: u16, error_type: &str) -> Self {
        match (status, error_type) {
            (401, _) | (403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400, _) if error_type.contains("context_length") => Self::ContextLengthExceeded,
            (408, _) | (409, _) => Self::Transient,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationError => "Authentication failed",
            Self::RateLimitExceeded => "Rate limit exceeded",
            Self::ModelNotFound => "Model not found",
            Self::ContextLengthExceeded => "Context too long",
            Self::Transient => "Transient upstream failure",
            Self::ServerError => "Server error",
            Self::Unknown => "Request rejected",
        }
    }
}

/// Convert a non-success chat-completions response into a service error.
///
/// The HTTP status is preserved so the retry policy can classify it.
pub fn to_fortune_error(status: u16, error_type: &str, message: &str) -> Error {
    let code = OpenAIErrorCode::from_response(status, error_type);
    Error::UpstreamStatus {
        status,
        message: format!("{}: {}", code.label(), message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_401() {
        let code = OpenAIErrorCode::from_response(401, "invalid_api_key");
        assert_eq!(code, OpenAIErrorCode::AuthenticationError);
    }

    #[test]
    fn test_error_code_from_429() {
        let code = OpenAIErrorCode::from_response(429, "rate_limit_exceeded");
        assert_eq!(code, OpenAIErrorCode::RateLimitExceeded);
    }

    #[test]
    fn test_error_code_from_404() {
        let code = OpenAIErrorCode::from_response(404, "model_not_found");
        assert_eq!(code, OpenAIErrorCode::ModelNotFound);
    }

    #[test]
    fn test_error_code_from_502() {
        let code = OpenAIErrorCode::from_response(502, "bad_gateway");
        assert_eq!(code, OpenAIErrorCode::ServerError);
    }

    #[test]
    fn test_error_code_from_unknown() {
        let code = OpenAIErrorCode::from_response(418, "im_a_teapot");
        assert_eq!(code, OpenAIErrorCode::Unknown);
    }

    #[test]
    fn test_converted_error_keeps_status_for_retry() {
        let err = to_fortune_error(503, "", "overloaded");
        assert!(err.is_retriable());
        assert!(err.to_string().contains("Server error: overloaded"));

        let err = to_fortune_error(401, "invalid_api_key", "bad key");
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("Authentication failed"));
    }
}
