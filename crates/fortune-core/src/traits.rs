//! Core traits for the share service abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::models::{DeepAnalysis, Document, Fortunes};

// =============================================================================
// STORE ABSTRACTION
// =============================================================================

/// Persistent store for share records keyed by an opaque id.
///
/// Every backend gives the same contract:
/// - `create` writes the whole document and propagates I/O failures;
///   colliding ids are not detected.
/// - `get` returns `None` for an unknown id.
/// - `update` shallow-merges `fields` into the existing document and fails
///   with `Error::ShareNotFound` when the id does not exist.
/// - `server_timestamp` yields a "time of write" marker meaningful only to
///   the backend that produced it.
#[async_trait]
pub trait ShareStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Whether the backend is configured and usable.
    fn is_available(&self) -> bool;

    /// Write a new record.
    async fn create(&self, id: &str, document: Document) -> Result<()>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Merge top-level fields into an existing record.
    async fn update(&self, id: &str, fields: Document) -> Result<()>;

    /// Opaque "time of write" marker for this backend.
    fn server_timestamp(&self) -> JsonValue;
}

// =============================================================================
// GENERATION BACKENDS
// =============================================================================

/// One part of a multimodal user message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Image URL or data URL.
    ImageUrl(String),
}

/// A single chat-completion request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationRequest {
    /// System instruction.
    pub system: String,
    /// User message parts.
    pub user: Vec<ContentPart>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// A text-only request.
    pub fn text(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: vec![ContentPart::Text(user.into())],
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Backend for text generation.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send one request and return the completion text (possibly empty).
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Model identifier used by this backend.
    fn model_name(&self) -> &str;
}

/// Produces deep analysis from short readings.
#[async_trait]
pub trait DeepAnalyzer: Send + Sync {
    /// Generate a deep analysis. Provider failures are absorbed into the
    /// fallback text; an error means nothing could be attempted at all.
    async fn analyze(&self, fortunes: &Fortunes) -> Result<DeepAnalysis>;
}
