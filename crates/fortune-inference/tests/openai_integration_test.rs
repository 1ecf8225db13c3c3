//! Live tests against a real OpenAI-compatible endpoint.
//!
//! ```bash
//! RUN_EXTERNAL_TESTS=1 \
//! AI_API_BASE_URL=https://space.ai-builders.com/backend/v1 \
//! AI_BUILDER_TOKEN=... \
//! cargo test --package fortune-inference --features integration --test openai_integration_test -- --nocapture
//! ```
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | RUN_EXTERNAL_TESTS | (unset) | Set to "1" or "true" to enable tests |
//! | AI_API_BASE_URL | AI Builder gateway | API endpoint |
//! | AI_BUILDER_TOKEN | (none) | Bearer token |
//! | AI_MODEL_GROK | grok-4-fast | Short-reading model |
//! | AI_MODEL_GEMINI | gemini-3-flash-preview | Deep-analysis model |

#![cfg(feature = "integration")]

use std::sync::Arc;

use fortune_core::defaults::{AI_API_BASE_URL, DEEP_MODEL, SHORT_MODEL};
use fortune_core::DeepAnalyzer;
use fortune_inference::openai::{OpenAIBackend, OpenAIConfig};
use fortune_inference::{DeepProvider, ProviderInvoker, ShortReadingClient};

/// Set RUN_EXTERNAL_TESTS=1 or RUN_EXTERNAL_TESTS=true to enable.
fn should_run_external_tests() -> bool {
    std::env::var("RUN_EXTERNAL_TESTS")
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

fn backend(model_var: &str, default_model: &str) -> OpenAIBackend {
    let config = OpenAIConfig::new(
        std::env::var("AI_API_BASE_URL").unwrap_or_else(|_| AI_API_BASE_URL.to_string()),
        std::env::var(model_var).unwrap_or_else(|_| default_model.to_string()),
    )
    .with_api_key(std::env::var("AI_BUILDER_TOKEN").ok());
    OpenAIBackend::new(config).expect("Failed to create backend")
}

#[tokio::test]
async fn test_live_short_then_deep() {
    if !should_run_external_tests() {
        println!("Skipping - set RUN_EXTERNAL_TESTS=1 to enable external API tests");
        return;
    }

    let short = ShortReadingClient::new(Arc::new(backend("AI_MODEL_GROK", SHORT_MODEL)));
    let reading = short.read(None, None).await.expect("short reading");
    println!("short: {:?}", reading);
    assert!(!reading.face.is_empty());

    let invoker = ProviderInvoker::new(vec![DeepProvider::new(
        "Gemini",
        Arc::new(backend("AI_MODEL_GEMINI", DEEP_MODEL)),
    )]);
    let analysis = invoker
        .analyze(&fortune_core::fortunes_from_primary(reading))
        .await
        .expect("deep analysis");
    println!("deep ({} chars): {}", analysis.text.len(), analysis.text);
    assert!(!analysis.is_fallback());
}
