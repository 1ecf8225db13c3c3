//! # fortune-api
//!
//! HTTP service for the fortune-teller share flow: short readings, share
//! records and their deep analyses.
//!
//! The binary in `main.rs` reads configuration, builds [`AppState`] and
//! serves [`router`]. Tests build the same router over in-memory backends.

pub mod config;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use config::ApiConfig;
pub use error::ApiError;
pub use state::AppState;

/// Largest accepted request body. Photos arrive as data URLs.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Build the CORS layer. An empty origin list allows any origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600))
}

/// Build the application router.
pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/fortune", post(handlers::fortune::generate_fortune))
        .route("/api/share", post(handlers::share::create_share))
        .route("/api/share/:id", get(handlers::share::get_share))
        .route("/api/analysis/l2", post(handlers::analysis::generate_analysis))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(cors_layer(allowed_origins))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use fortune_db::MemoryShareStore;

    use crate::services::PrewarmCache;

    fn app() -> Router {
        let state = AppState::new(
            Arc::new(MemoryShareStore::new()),
            None,
            None,
            PrewarmCache::default(),
            BTreeMap::new(),
        );
        router(state, &["https://fortune.example".to_string()])
    }

    #[tokio::test]
    async fn test_request_id_is_set() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_cors_allows_configured_origin() {
        let response = app()
            .oneshot(
                Request::get("/api/health")
                    .header(header::ORIGIN, "https://fortune.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://fortune.example"
        );
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_invalid_share_body_is_rejected() {
        let response = app()
            .oneshot(
                Request::post("/api/share")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"fortunes": "not a map"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
