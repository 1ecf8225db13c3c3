//! Health check handler.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: BTreeMap<String, String>,
    pub token_configured: bool,
    pub storage_backend: &'static str,
    pub storage_available: bool,
}

/// Report configuration state. Always 200.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store();
    Json(HealthResponse {
        status: "ok",
        models: state.models.as_ref().clone(),
        token_configured: state.token_configured(),
        storage_backend: store.backend_name(),
        storage_available: store.is_available(),
    })
}
