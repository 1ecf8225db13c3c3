//! Centralized default constants.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

use std::time::Duration;

// =============================================================================
// GENERATION PROVIDERS
// =============================================================================

/// Default OpenAI-compatible API base URL.
pub const AI_API_BASE_URL: &str = "https://space.ai-builders.com/backend/v1";

/// Provider key whose short reading feeds the deep analysis and the cache signature.
pub const SHORT_PROVIDER: &str = "grok";

/// Default short-reading model.
pub const SHORT_MODEL: &str = "grok-4-fast";

/// Display name of the default deep-analysis provider.
pub const DEEP_PROVIDER_NAME: &str = "Gemini";

/// Default deep-analysis model.
pub const DEEP_MODEL: &str = "gemini-3-flash-preview";

/// Per-request timeout for short readings.
pub const SHORT_TIMEOUT_SECS: u64 = 40;

/// Per-request timeout for deep analysis.
pub const DEEP_TIMEOUT_SECS: u64 = 300;

/// Sampling temperature for short readings.
pub const SHORT_TEMPERATURE: f32 = 0.6;

/// Token cap for short readings.
pub const SHORT_MAX_TOKENS: u32 = 1200;

/// Sampling temperature for deep analysis.
pub const DEEP_TEMPERATURE: f32 = 1.0;

/// Token cap for deep analysis.
pub const DEEP_MAX_TOKENS: u32 = 4000;

// =============================================================================
// RETRY
// =============================================================================

/// Attempts per provider, including the first call.
pub const RETRY_MAX_ATTEMPTS: u32 = 4;

/// Delay before the first retry; doubles on each subsequent retry.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

// =============================================================================
// SPECULATIVE CACHE
// =============================================================================

/// How long a prewarmed deep analysis stays consumable.
pub const PREWARM_TTL: Duration = Duration::from_secs(15 * 60);

/// Upper bound on prewarmed entries held at once.
pub const PREWARM_MAX_ENTRIES: usize = 256;

// =============================================================================
// DEEP ANALYSIS TEXT
// =============================================================================

/// Text returned when every deep-analysis provider failed.
pub const DEEP_FALLBACK_MESSAGE: &str = "深度分析生成失败，请稍后重试。";

/// Substring identifying fallback text; such results are never cached.
pub const DEEP_FAILURE_MARKER: &str = "失败";

// =============================================================================
// STORAGE
// =============================================================================

/// Default Firestore collection for share records.
pub const FIRESTORE_COLLECTION: &str = "fortunes";

/// Default PostgreSQL table for share records.
pub const SHARE_TABLE: &str = "share_records";

/// Length of the externally visible share id.
pub const SHARE_ID_LEN: usize = 8;
