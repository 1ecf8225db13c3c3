//! Deep-analysis provider invoker.
//!
//! Every configured provider is called concurrently with its own retry loop.
//! Successful texts are composed in configuration order; when nothing
//! succeeds the fixed fallback message is returned instead of an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use fortune_core::defaults::{DEEP_MAX_TOKENS, DEEP_TEMPERATURE};
use fortune_core::{
    DeepAnalysis, DeepAnalyzer, Error, Fortunes, GenerationBackend, GenerationRequest, Result,
    RetryPolicy,
};

use crate::prompts::{deep_user_message, DEEP_ANALYSIS_PROMPT};
use crate::short_reading::strip_code_fences;

/// A named deep-analysis provider.
#[derive(Clone)]
pub struct DeepProvider {
    /// Display name used for attribution.
    pub name: String,
    pub backend: Arc<dyn GenerationBackend>,
}

impl DeepProvider {
    pub fn new(name: impl Into<String>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }
}

impl std::fmt::Debug for DeepProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepProvider")
            .field("name", &self.name)
            .field("model", &self.backend.model_name())
            .finish()
    }
}

/// Outcome of one provider after retries: its name and text, if any.
pub type ProviderOutcome = (String, Option<String>);

/// Runs deep-analysis providers with retry and composes their output.
#[derive(Debug, Clone)]
pub struct ProviderInvoker {
    providers: Vec<DeepProvider>,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl ProviderInvoker {
    pub fn new(providers: Vec<DeepProvider>) -> Self {
        Self {
            providers,
            policy: RetryPolicy::default(),
            attempt_timeout: None,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Deadline applied to each individual attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn providers(&self) -> &[DeepProvider] {
        &self.providers
    }

    async fn call_once(&self, provider: &DeepProvider, request: &GenerationRequest) -> Result<String> {
        let generation = provider.backend.generate(request);
        let text = match self.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, generation).await.map_err(|_| {
                Error::Timeout(format!("{} exceeded {}s", provider.name, limit.as_secs()))
            })??,
            None => generation.await?,
        };

        let text = strip_code_fences(&text);
        if text.is_empty() {
            return Err(Error::EmptyResponse(provider.name.clone()));
        }
        Ok(text)
    }

    /// Call one provider until it succeeds or its retries are exhausted.
    pub async fn call_with_retry(&self, provider: &DeepProvider, user_message: &str) -> ProviderOutcome {
        let start = Instant::now();
        let request = GenerationRequest::text(DEEP_ANALYSIS_PROMPT, user_message)
            .with_temperature(DEEP_TEMPERATURE)
            .with_max_tokens(DEEP_MAX_TOKENS);

        let label = format!("deep:{}", provider.name);
        let result = self
            .policy
            .run(&label, |attempt| {
                debug!(
                    subsystem = "inference",
                    provider = %provider.name,
                    attempt,
                    "Deep analysis attempt"
                );
                self.call_once(provider, &request)
            })
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match result {
            Ok(text) => {
                info!(
                    subsystem = "inference",
                    provider = %provider.name,
                    model = %provider.backend.model_name(),
                    response_len = text.len(),
                    duration_ms,
                    "Deep analysis generated"
                );
                (provider.name.clone(), Some(text))
            }
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    provider = %provider.name,
                    model = %provider.backend.model_name(),
                    duration_ms,
                    error = %e,
                    "Deep analysis provider failed"
                );
                (provider.name.clone(), None)
            }
        }
    }

    /// Call every provider concurrently. Order matches configuration.
    pub async fn invoke_all(&self, fortunes: &Fortunes) -> Vec<ProviderOutcome> {
        let user_message = deep_user_message(fortunes);
        join_all(
            self.providers
                .iter()
                .map(|provider| self.call_with_retry(provider, &user_message)),
        )
        .await
    }

    /// Compose provider outcomes into one analysis.
    ///
    /// Each section is headed by its provider name only when more than one
    /// provider is configured.
    pub fn compose(&self, outcomes: Vec<ProviderOutcome>) -> DeepAnalysis {
        let succeeded: Vec<(String, String)> = outcomes
            .into_iter()
            .filter_map(|(name, text)| text.map(|t| (name, t)))
            .collect();

        if succeeded.is_empty() {
            return DeepAnalysis::fallback();
        }

        let attribute = self.providers.len() > 1;
        let text = succeeded
            .iter()
            .map(|(name, text)| {
                if attribute {
                    format!("【{}】\n{}", name, text)
                } else {
                    text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        DeepAnalysis {
            text,
            providers: succeeded.into_iter().map(|(name, _)| name).collect(),
        }
    }
}

#[async_trait]
impl DeepAnalyzer for ProviderInvoker {
    async fn analyze(&self, fortunes: &Fortunes) -> Result<DeepAnalysis> {
        if self.providers.is_empty() {
            return Err(Error::Config("No deep-analysis providers configured".to_string()));
        }
        let outcomes = self.invoke_all(fortunes).await;
        Ok(self.compose(outcomes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGenerationBackend, MockOutcome};
    use fortune_core::{fortunes_from_primary, ShortReading};

    fn provider(name: &str, backend: MockGenerationBackend) -> DeepProvider {
        DeepProvider::new(name, Arc::new(backend))
    }

    #[test]
    fn test_compose_single_provider_has_no_header() {
        let invoker = ProviderInvoker::new(vec![provider("Gemini", MockGenerationBackend::new())]);
        let analysis = invoker.compose(vec![("Gemini".into(), Some("body".into()))]);
        assert_eq!(analysis.text, "body");
        assert_eq!(analysis.providers, vec!["Gemini".to_string()]);
    }

    #[test]
    fn test_compose_all_failed_is_fallback() {
        let invoker = ProviderInvoker::new(vec![provider("Gemini", MockGenerationBackend::new())]);
        let analysis = invoker.compose(vec![("Gemini".into(), None)]);
        assert!(analysis.is_fallback());
        assert!(!analysis.is_cacheable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_is_retriable() {
        let slow = MockGenerationBackend::new()
            .with_latency(Duration::from_secs(10))
            .with_default_text("late");
        let handle = slow.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", slow)])
            .with_retry_policy(RetryPolicy::new().max_attempts(2))
            .with_attempt_timeout(Duration::from_secs(1));

        let fortunes = fortunes_from_primary(ShortReading::new("A", "B", "C"));
        let analysis = invoker.analyze(&fortunes).await.unwrap();

        assert!(analysis.is_fallback());
        assert_eq!(handle.call_count(), 2);
    }

    #[tokio::test]
    async fn test_no_providers_is_config_error() {
        let invoker = ProviderInvoker::new(Vec::new());
        let err = invoker.analyze(&Fortunes::new()).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    fn sample() -> Fortunes {
        fortunes_from_primary(ShortReading::new("A", "B", "C"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriable_failures_then_success_makes_exactly_n_calls() {
        let backend = MockGenerationBackend::new()
            .then_status(503)
            .then_timeout()
            .then_empty()
            .then_text("fourth time lucky");
        let handle = backend.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", backend)]);

        let start = tokio::time::Instant::now();
        let analysis = invoker.analyze(&sample()).await.unwrap();

        assert_eq!(analysis.text, "fourth time lucky");
        assert_eq!(handle.call_count(), 4);
        // 1s + 2s + 4s of backoff between the four attempts
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retriable_error_makes_one_call() {
        let backend = MockGenerationBackend::new()
            .then_status(400)
            .with_default_text("never reached");
        let handle = backend.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", backend)]);

        let start = tokio::time::Instant::now();
        let analysis = invoker.analyze(&sample()).await.unwrap();

        assert!(analysis.is_fallback());
        assert_eq!(handle.call_count(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_yield_fallback() {
        let backend = MockGenerationBackend::new().with_default(MockOutcome::Status(502));
        let handle = backend.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", backend)]);

        let analysis = invoker.analyze(&sample()).await.unwrap();

        assert_eq!(analysis, DeepAnalysis::fallback());
        assert_eq!(handle.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_of_two_providers_failing_keeps_only_successful_section() {
        let good = MockGenerationBackend::new().with_default_text("gemini insight");
        let bad = MockGenerationBackend::new().with_default(MockOutcome::Unreachable);
        let bad_handle = bad.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", good), provider("Grok", bad)]);

        let analysis = invoker.analyze(&sample()).await.unwrap();

        assert_eq!(analysis.text, "【Gemini】\ngemini insight");
        assert_eq!(analysis.providers, vec!["Gemini".to_string()]);
        assert!(!analysis.text.contains("Grok"));
        assert_eq!(bad_handle.call_count(), 4);
    }

    #[tokio::test]
    async fn test_two_successful_providers_keep_configuration_order() {
        let invoker = ProviderInvoker::new(vec![
            provider("Gemini", MockGenerationBackend::new().with_default_text("one")),
            provider("Grok", MockGenerationBackend::new().with_default_text("two")),
        ]);

        let analysis = invoker.analyze(&sample()).await.unwrap();
        assert_eq!(analysis.text, "【Gemini】\none\n\n【Grok】\ntwo");
    }

    #[tokio::test]
    async fn test_deep_request_carries_context_and_sampling() {
        let backend = MockGenerationBackend::new().with_default_text("ok");
        let handle = backend.clone();
        let invoker = ProviderInvoker::new(vec![provider("Gemini", backend)]);

        invoker.analyze(&sample()).await.unwrap();

        let request = &handle.requests()[0];
        assert_eq!(request.system, DEEP_ANALYSIS_PROMPT);
        assert_eq!(request.temperature, Some(DEEP_TEMPERATURE));
        assert_eq!(request.max_tokens, Some(DEEP_MAX_TOKENS));
        match &request.user[0] {
            fortune_core::ContentPart::Text(text) => assert!(text.contains("面相：A")),
            other => panic!("unexpected part {:?}", other),
        }
    }
}
