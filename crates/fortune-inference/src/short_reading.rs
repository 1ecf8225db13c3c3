//! Short (preview) reading from the primary provider.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tracing::{info, warn};

use fortune_core::defaults::{SHORT_MAX_TOKENS, SHORT_PROVIDER, SHORT_TEMPERATURE};
use fortune_core::{Error, GenerationBackend, GenerationRequest, Result, ShortReading};

use crate::prompts::{build_user_content, SYSTEM_PROMPT};

/// Attribution written into every generated reading.
pub const AI_SOURCE: &str = "ai";

const REQUIRED_FIELDS: [&str; 3] = ["face", "career", "blessing"];

/// Remove Markdown code-fence markers around a completion.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse a completion into a reading, requiring all three fields.
pub fn parse_short_reading(text: &str, model: &str) -> Result<ShortReading> {
    let cleaned = strip_code_fences(text);
    if cleaned.is_empty() {
        return Err(Error::Inference("empty response".to_string()));
    }
    let parsed: JsonValue = serde_json::from_str(&cleaned)
        .map_err(|e| Error::Inference(format!("Reading is not valid JSON: {}", e)))?;

    let field = |name: &str| -> Result<String> {
        match parsed.get(name) {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(JsonValue::Null) | None => Err(Error::Inference(format!(
                "incomplete structure: missing '{}'",
                name
            ))),
            Some(other) => Ok(other.to_string()),
        }
    };

    let [face, career, blessing] = REQUIRED_FIELDS;
    let mut reading = ShortReading::new(field(face)?, field(career)?, field(blessing)?);
    reading.source = Some(AI_SOURCE.to_string());
    reading.model = Some(model.to_string());
    Ok(reading)
}

/// Calls the short-reading provider once; there is no retry.
#[derive(Clone)]
pub struct ShortReadingClient {
    backend: Arc<dyn GenerationBackend>,
}

impl ShortReadingClient {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Produce a reading for an optional face image and measurement text.
    pub async fn read(&self, image: Option<&str>, measurements: Option<&str>) -> Result<ShortReading> {
        let start = Instant::now();
        let request = GenerationRequest {
            system: SYSTEM_PROMPT.to_string(),
            user: build_user_content(image, measurements),
            temperature: Some(SHORT_TEMPERATURE),
            max_tokens: Some(SHORT_MAX_TOKENS),
        };

        let result = self
            .backend
            .generate(&request)
            .await
            .and_then(|text| parse_short_reading(&text, self.backend.model_name()));

        match &result {
            Ok(_) => info!(
                subsystem = "inference",
                provider = SHORT_PROVIDER,
                model = %self.backend.model_name(),
                has_image = image.is_some(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Short reading generated"
            ),
            Err(e) => warn!(
                subsystem = "inference",
                provider = SHORT_PROVIDER,
                model = %self.backend.model_name(),
                duration_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Short reading failed"
            ),
        }
        result
    }
}
