//! # fortune-inference
//!
//! Generation backends for the fortune-teller service.
//!
//! This crate provides:
//! - An OpenAI-compatible chat-completions backend
//! - The short-reading client (one structured call, no retry)
//! - The deep-analysis provider invoker (concurrent providers, bounded
//!   exponential-backoff retry, attributed composition with a fallback)
//! - Prompt text and message builders
//!
//! # Feature Flags
//!
//! - `mock`: expose [`mock::MockGenerationBackend`] to other crates' tests
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fortune_core::{DeepAnalyzer, fortunes_from_primary, ShortReading};
//! use fortune_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use fortune_inference::{DeepProvider, ProviderInvoker};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig::new("https://space.ai-builders.com/backend/v1", "gemini-3-flash-preview")
//!         .with_api_key(std::env::var("AI_BUILDER_TOKEN").ok());
//!     let backend = Arc::new(OpenAIBackend::new(config).unwrap());
//!     let invoker = ProviderInvoker::new(vec![DeepProvider::new("Gemini", backend)]);
//!
//!     let fortunes = fortunes_from_primary(ShortReading::new("A", "B", "C"));
//!     let analysis = invoker.analyze(&fortunes).await.unwrap();
//!     println!("{}", analysis.text);
//! }
//! ```

pub mod invoker;
pub mod openai;
pub mod prompts;
pub mod short_reading;

// Mock generation backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use invoker::{DeepProvider, ProviderInvoker, ProviderOutcome};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use short_reading::{parse_short_reading, ShortReadingClient};
