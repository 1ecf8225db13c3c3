//! Short-reading (preview) handler.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;

use fortune_core::{fortunes_from_primary, ShortReading};

use crate::{ApiError, AppState};

/// Request body for a short reading. Both fields are optional.
#[derive(Debug, Default, Deserialize)]
pub struct FortuneRequest {
    /// Face photo as a data URL.
    pub image: Option<String>,
    /// Measurement summary computed on the client.
    pub measurements: Option<String>,
}

/// Short reading keyed by provider, in the multi-provider layout clients
/// expect. Only the primary provider is called, so `gemini` is always null.
#[derive(Debug, Serialize)]
pub struct FortuneResponse {
    pub gemini: Option<ShortReading>,
    pub grok: ShortReading,
}

/// Produce a short reading and prewarm its deep analysis.
///
/// # Request Body
/// - `image`: data URL of the captured face (optional)
/// - `measurements`: measurement text (optional)
///
/// # Returns
/// - 200 OK with `{"gemini": null, "grok": reading}`
/// - 502 Bad Gateway if the provider fails or returns an unusable reading
/// - 503 Service Unavailable if no generation token is configured
pub async fn generate_fortune(
    State(state): State<AppState>,
    req: Option<Json<FortuneRequest>>,
) -> Result<Json<FortuneResponse>, ApiError> {
    let reader = state.short_reader.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("AI_BUILDER_TOKEN not configured on the server".into())
    })?;
    let req = req.map(|Json(r)| r).unwrap_or_default();

    let reading = reader
        .read(req.image.as_deref(), req.measurements.as_deref())
        .await
        .map_err(|_| ApiError::BadGateway("Grok model failed".into()))?;

    if state.deep.spawn_prewarm(fortunes_from_primary(reading.clone())).is_some() {
        debug!(subsystem = "api", "Prewarm scheduled");
    }

    Ok(Json(FortuneResponse {
        gemini: None,
        grok: reading,
    }))
}
