//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint implementing `/chat/completions`, including the
//! AI Builder gateway the service is deployed against, OpenAI itself, and
//! local servers such as vLLM or Ollama in compatibility mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use fortune_core::{GenerationBackend, GenerationRequest};
//! use fortune_inference::openai::{OpenAIBackend, OpenAIConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig::new("http://localhost:11434/v1", "llama3")
//!         .with_timeout_secs(120);
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let request = GenerationRequest::text("You are terse.", "Say hi");
//!     let text = backend.generate(&request).await.unwrap();
//!     println!("{}", text);
//! }
//! ```

mod backend;
mod error;
mod types;

pub use backend::{OpenAIBackend, OpenAIConfig};
pub use error::{to_fortune_error, OpenAIErrorCode};
pub use types::*;
