//! Bounded exponential-backoff retry policy.
//!
//! Shared by the provider invoker and the document store. A call is retried
//! only when its error is transient (see [`Error::is_retriable`]); the delay
//! doubles from `base_delay` on every retry and is optionally capped. No
//! delay is taken after the final attempt or after a permanent failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::defaults::{RETRY_BASE_DELAY, RETRY_MAX_ATTEMPTS};
use crate::error::{Error, Result};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first call. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_delay: RETRY_BASE_DELAY,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Option<Duration>) -> Self {
        self.max_delay = delay;
        self
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::default().max_attempts(1)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base_delay.saturating_mul(factor);
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. The last error is returned
    /// when every attempt failed.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 1;
        loop {
            let err: Error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if attempt >= max_attempts || !err.is_retriable() {
                return Err(err);
            }

            let delay = self.delay_for(attempt);
            warn!(
                subsystem = "retry",
                label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
