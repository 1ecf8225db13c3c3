//! OpenAI-compatible chat-completions backend.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use fortune_core::defaults::{AI_API_BASE_URL, DEEP_TIMEOUT_SECS};
use fortune_core::{Error, GenerationBackend, GenerationRequest, Result};

use super::error::to_fortune_error;
use super::types::*;

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// Bearer token (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to request.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: AI_API_BASE_URL.to_string(),
            api_key: None,
            model: String::new(),
            timeout_seconds: DEEP_TIMEOUT_SECS,
        }
    }
}

impl OpenAIConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }
}

/// Backend speaking the `/chat/completions` protocol.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            model = %config.model,
            timeout_secs = config.timeout_seconds,
            "Initializing OpenAI-compatible backend"
        );

        Ok(Self { client, config })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let req = self.client.post(&url);

        match self.config.api_key {
            Some(ref api_key) => req.bearer_auth(api_key),
            None => req,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAIBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage::system(request.system.clone()));
        }
        messages.push(ChatMessage::user(&request.user));

        let body = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self.build_request("/chat/completions").json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let (error_type, message) = match serde_json::from_str::<OpenAIErrorResponse>(&text) {
                Ok(parsed) => (
                    parsed.error.error_type.unwrap_or_default(),
                    parsed.error.message,
                ),
                Err(_) => (String::new(), text),
            };
            return Err(to_fortune_error(status, &error_type, &message));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;
        let content = result.first_text();

        debug!(
            subsystem = "inference",
            model = %self.config.model,
            response_len = content.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OpenAIConfig::default();
        assert_eq!(config.base_url, AI_API_BASE_URL);
        assert_eq!(config.timeout_seconds, DEEP_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_empty_api_key_is_dropped() {
        let config = OpenAIConfig::new("http://x", "m").with_api_key(Some(String::new()));
        assert!(config.api_key.is_none());
        let config = OpenAIConfig::new("http://x", "m").with_api_key(Some("k".into()));
        assert_eq!(config.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_backend_reports_model() {
        let backend = OpenAIBackend::new(OpenAIConfig::new("http://x", "grok-4-fast")).unwrap();
        assert_eq!(backend.model_name(), "grok-4-fast");
    }
}
