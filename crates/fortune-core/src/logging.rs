//! Structured logging schema and field name constants.
//!
//! All crates use these constants for consistent structured logging fields
//! so log queries work the same way across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "store", "inference", "cache"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "postgres", "firestore", "invoker", "prewarm"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "update", "generate", "take"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Share record id.
pub const SHARE_ID: &str = "share_id";

/// Speculative cache signature (hex digest).
pub const SIGNATURE: &str = "signature";

/// Display name of a generation provider.
pub const PROVIDER: &str = "provider";

/// Model identifier used for generation.
pub const MODEL: &str = "model";

/// Storage backend name ("postgres", "firestore", "memory").
pub const BACKEND: &str = "backend";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// 1-based attempt number of a retried call.
pub const ATTEMPT: &str = "attempt";

/// Configured maximum attempt count.
pub const MAX_ATTEMPTS: &str = "max_attempts";

/// Delay before the next retry, in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Number of entries held by an in-memory cache.
pub const CACHE_SIZE: &str = "cache_size";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Whether a value was served from a cache.
pub const CACHED: &str = "cached";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_are_snake_case() {
        for field in [
            SUBSYSTEM,
            COMPONENT,
            OPERATION,
            SHARE_ID,
            SIGNATURE,
            PROVIDER,
            MODEL,
            BACKEND,
            DURATION_MS,
            ATTEMPT,
            MAX_ATTEMPTS,
            DELAY_MS,
            RESPONSE_LEN,
            CACHE_SIZE,
            SUCCESS,
            ERROR_MSG,
            CACHED,
        ] {
            assert!(field
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
