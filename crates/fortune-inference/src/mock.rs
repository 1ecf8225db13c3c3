//! Mock generation backend for deterministic testing.
//!
//! Outcomes are scripted in order; once the script runs out every call gets
//! the default outcome. Clones share the script and the call log, so a test
//! can keep a handle while the backend is owned elsewhere.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fortune_inference::mock::MockGenerationBackend;
//!
//! let backend = MockGenerationBackend::new()
//!     .then_status(503)
//!     .then_text("second try works");
//! assert_eq!(backend.call_count(), 0);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use fortune_core::{Error, GenerationBackend, GenerationRequest, Result};

/// One scripted response.
#[derive(Debug, Clone, PartialEq)]
pub enum MockOutcome {
    Text(String),
    /// Upstream answers with this HTTP status.
    Status(u16),
    Timeout,
    /// Connection refused.
    Unreachable,
    /// Successful response without any text.
    Empty,
}

#[derive(Debug)]
struct MockState {
    script: VecDeque<MockOutcome>,
    default: MockOutcome,
    requests: Vec<GenerationRequest>,
}

/// Scripted [`GenerationBackend`].
#[derive(Debug, Clone)]
pub struct MockGenerationBackend {
    model: String,
    latency: Option<Duration>,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationBackend {
    /// A backend that answers "Mock response" to everything.
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            latency: None,
            state: Arc::new(Mutex::new(MockState {
                script: VecDeque::new(),
                default: MockOutcome::Text("Mock response".to_string()),
                requests: Vec::new(),
            })),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Simulated latency before every response.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Outcome used once the script is exhausted.
    pub fn with_default(self, outcome: MockOutcome) -> Self {
        self.state().default = outcome;
        self
    }

    pub fn with_default_text(self, text: impl Into<String>) -> Self {
        self.with_default(MockOutcome::Text(text.into()))
    }

    /// Append an outcome to the script.
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.state().script.push_back(outcome);
        self
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.then(MockOutcome::Text(text.into()))
    }

    pub fn then_status(self, status: u16) -> Self {
        self.then(MockOutcome::Status(status))
    }

    pub fn then_timeout(self) -> Self {
        self.then(MockOutcome::Timeout)
    }

    pub fn then_empty(self) -> Self {
        self.then(MockOutcome::Empty)
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of `generate` calls so far.
    pub fn call_count(&self) -> usize {
        self.state().requests.len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let outcome = {
            let mut state = self.state();
            state.requests.push(request.clone());
            let default = state.default.clone();
            state.script.pop_front().unwrap_or(default)
        };

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match outcome {
            MockOutcome::Text(text) => Ok(text),
            MockOutcome::Empty => Ok(String::new()),
            MockOutcome::Status(status) => Err(Error::UpstreamStatus {
                status,
                message: "mock failure".to_string(),
            }),
            MockOutcome::Timeout => Err(Error::Timeout("mock timeout".to_string())),
            MockOutcome::Unreachable => Err(Error::Connection("mock connection refused".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
