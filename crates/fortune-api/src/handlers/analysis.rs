//! On-demand deep analysis handler.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub share_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: String,
    /// True when the analysis was already stored on the share.
    pub cached: bool,
}

/// Return the deep analysis for a share, generating and storing it if
/// the share has none yet.
///
/// # Request Body
/// - `share_id`: id returned by share creation
///
/// # Returns
/// - 200 OK with `{"analysis", "cached"}`
/// - 404 Not Found if the share does not exist
/// - 503 Service Unavailable without a generation token or store
pub async fn generate_analysis(
    State(state): State<AppState>,
    Json(req): Json<AnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    if !state.token_configured() {
        return Err(ApiError::ServiceUnavailable("AI token not configured".into()));
    }
    if !state.store().is_available() {
        return Err(ApiError::ServiceUnavailable("Share feature not available".into()));
    }

    let outcome = state
        .deep
        .compute_and_cache(&req.share_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Share not found".into()))?;

    Ok(Json(AnalysisResponse {
        analysis: outcome.analysis,
        cached: outcome.cached,
    }))
}
