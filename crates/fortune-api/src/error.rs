//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use fortune_core::Error;

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Missing credentials or no usable storage backend.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// An upstream dependency (generation provider or store write) failed.
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::ShareNotFound(_) => ApiError::NotFound("Share not found".to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Config(msg) => ApiError::ServiceUnavailable(msg),
            Error::Inference(_)
            | Error::UpstreamStatus { .. }
            | Error::Timeout(_)
            | Error::Connection(_)
            | Error::EmptyResponse(_)
            | Error::Request(_) => ApiError::BadGateway(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let cases = [
            (Error::ShareNotFound("abc".into()), StatusCode::NOT_FOUND),
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (Error::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (Error::Config("no token".into()), StatusCode::SERVICE_UNAVAILABLE),
            (
                Error::UpstreamStatus {
                    status: 503,
                    message: "down".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (Error::Timeout("slow".into()), StatusCode::BAD_GATEWAY),
            (Error::Inference("junk".into()), StatusCode::BAD_GATEWAY),
            (Error::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Internal("bug".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_share_not_found_message() {
        let err = ApiError::from(Error::ShareNotFound("abc12345".into()));
        assert_eq!(err.to_string(), "Share not found");
    }
}
