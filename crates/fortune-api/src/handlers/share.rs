//! Share record handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use fortune_core::{normalize_fortunes, Error, Fortunes, ShareRecord, ShortReading};

use crate::{ApiError, AppState};

/// Request body for creating a share.
#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    /// Pixelated avatar as a data URL.
    pub pixelated_image: Option<String>,
    /// Face-landmark visualization payload.
    pub visualization_data: Option<JsonValue>,
    /// Short readings keyed by provider.
    pub fortunes: Option<Fortunes>,
    /// Single reading sent by older clients.
    pub fortune: Option<ShortReading>,
}

#[derive(Debug, Serialize)]
pub struct CreateShareResponse {
    pub id: String,
    pub url: String,
}

/// A share as rendered by the share page.
#[derive(Debug, Serialize, Deserialize)]
pub struct ShareResponse {
    pub pixelated_image: Option<String>,
    pub visualization_data: Option<JsonValue>,
    pub fortunes: Fortunes,
    pub analysis_l2: Option<String>,
}

impl From<ShareRecord> for ShareResponse {
    fn from(record: ShareRecord) -> Self {
        Self {
            pixelated_image: record.pixelated_image,
            visualization_data: record.visualization_data,
            fortunes: record.fortunes,
            analysis_l2: record.analysis_l2,
        }
    }
}

/// Persist a share and return its id.
///
/// Never waits on deep-analysis generation: a prewarmed analysis is stored
/// with the record, otherwise one is backfilled in the background.
///
/// # Request Body
/// - `pixelated_image`, `visualization_data` (optional)
/// - `fortunes`: readings keyed by provider, or legacy `fortune`
///
/// # Returns
/// - 200 OK with `{"id", "url"}`
/// - 502 Bad Gateway if the store write fails
/// - 503 Service Unavailable if no store is available
pub async fn create_share(
    State(state): State<AppState>,
    Json(req): Json<CreateShareRequest>,
) -> Result<Json<CreateShareResponse>, ApiError> {
    if !state.store().is_available() {
        return Err(ApiError::ServiceUnavailable(
            "Share feature not available (storage not configured)".into(),
        ));
    }

    let record = ShareRecord {
        pixelated_image: req.pixelated_image,
        visualization_data: req.visualization_data,
        fortunes: normalize_fortunes(req.fortunes, req.fortune),
        analysis_l2: None,
    };

    let created = state.deep.create_share(record).await.map_err(|e| match e {
        Error::Config(msg) => ApiError::ServiceUnavailable(msg),
        _ => ApiError::BadGateway("Failed to persist share data".into()),
    })?;

    Ok(Json(CreateShareResponse {
        url: format!("/share/{}", created.id),
        id: created.id,
    }))
}

/// Fetch a share by id.
///
/// # Returns
/// - 200 OK with the decoded share
/// - 404 Not Found if the id is unknown
/// - 503 Service Unavailable if no store is available
pub async fn get_share(
    State(state): State<AppState>,
    Path(share_id): Path<String>,
) -> Result<Json<ShareResponse>, ApiError> {
    if !state.store().is_available() {
        return Err(ApiError::ServiceUnavailable("Share feature not available".into()));
    }

    let record = state
        .deep
        .get_share(&share_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Share not found".into()))?;

    Ok(Json(record.into()))
}
