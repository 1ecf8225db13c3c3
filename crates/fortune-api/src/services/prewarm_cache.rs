//! In-process speculative cache for deep analyses.
//!
//! A preview request starts a deep-analysis generation in the background and
//! parks the result here, keyed by a signature of the short reading. The
//! share request that follows pops it, so the record is written with its
//! analysis and no second upstream call is made.
//!
//! Entries expire after the TTL and the table is capped; the oldest entries
//! go first. An in-flight set keeps two generations for the same signature
//! from running at once. Both structures sit behind one mutex that is never
//! held across an await.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use fortune_core::defaults::{PREWARM_MAX_ENTRIES, PREWARM_TTL, SHORT_PROVIDER};
use fortune_core::{primary_reading, DeepAnalyzer, Fortunes};

/// Compute the cache signature of a fortunes payload.
///
/// Only the primary provider's `face`, `career` and `blessing` count;
/// attribution fields are ignored. Returns `None` when there is no usable
/// primary reading.
pub fn signature_of(fortunes: &Fortunes) -> Option<String> {
    let reading = primary_reading(fortunes)?;
    // Keys listed in sorted order so the serialization is canonical.
    let canonical = serde_json::json!({
        SHORT_PROVIDER: {
            "blessing": reading.blessing,
            "career": reading.career,
            "face": reading.face,
        }
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    Some(hex::encode(hasher.finalize()))
}

#[derive(Debug)]
struct CacheEntry {
    analysis: String,
    created_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    in_flight: HashSet<String>,
}

struct PrewarmCacheInner {
    state: Mutex<CacheState>,
    ttl: Duration,
    max_entries: usize,
}

/// Speculative deep-analysis cache.
#[derive(Clone)]
pub struct PrewarmCache {
    inner: Arc<PrewarmCacheInner>,
}

impl Default for PrewarmCache {
    fn default() -> Self {
        Self::new(PREWARM_TTL, PREWARM_MAX_ENTRIES)
    }
}

impl PrewarmCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Arc::new(PrewarmCacheInner {
                state: Mutex::new(CacheState::default()),
                ttl,
                max_entries,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.inner.max_entries
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored entries, expired ones included until the next pass.
    pub fn len(&self) -> usize {
        self.state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self, signature: &str) -> bool {
        self.state().in_flight.contains(signature)
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) > self.inner.ttl
    }

    /// Store an analysis under `signature`, stamped now.
    pub fn insert(&self, signature: impl Into<String>, analysis: impl Into<String>) {
        self.insert_at(signature, analysis, Instant::now());
    }

    /// Store an analysis with an explicit creation time, then collect garbage.
    pub fn insert_at(&self, signature: impl Into<String>, analysis: impl Into<String>, now: Instant) {
        {
            let mut state = self.state();
            state.entries.insert(
                signature.into(),
                CacheEntry {
                    analysis: analysis.into(),
                    created_at: now,
                },
            );
        }
        self.collect_garbage(now);
    }

    /// Drop expired entries, then the oldest until at most `max_entries` remain.
    pub fn collect_garbage(&self, now: Instant) {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|_, entry| !self.is_expired(entry, now));

        let excess = state.entries.len().saturating_sub(self.inner.max_entries);
        if excess > 0 {
            let mut by_age: Vec<(Instant, String)> = state
                .entries
                .iter()
                .map(|(signature, entry)| (entry.created_at, signature.clone()))
                .collect();
            by_age.sort();
            for (_, signature) in by_age.into_iter().take(excess) {
                state.entries.remove(&signature);
            }
        }

        let removed = before - state.entries.len();
        if removed > 0 {
            debug!(
                subsystem = "cache",
                removed,
                cache_size = state.entries.len(),
                "Prewarm cache collected"
            );
        }
    }

    /// Pop the analysis cached for these fortunes, if it is still fresh.
    pub fn take(&self, fortunes: &Fortunes) -> Option<String> {
        self.take_at(fortunes, Instant::now())
    }

    /// `take` evaluated at an explicit instant.
    ///
    /// An expired entry is removed but not returned.
    pub fn take_at(&self, fortunes: &Fortunes, now: Instant) -> Option<String> {
        let signature = signature_of(fortunes)?;
        self.collect_garbage(now);
        let entry = self.state().entries.remove(&signature)?;
        if self.is_expired(&entry, now) {
            return None;
        }
        Some(entry.analysis)
    }

    /// Mark `signature` as in flight. `None` if it already is.
    fn begin(&self, signature: &str) -> Option<InFlightGuard> {
        let mut state = self.state();
        if !state.in_flight.insert(signature.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            cache: self.clone(),
            signature: signature.to_string(),
        })
    }

    /// Generate and cache a deep analysis for these fortunes.
    ///
    /// Skipped when there is no signature or one is already running for the
    /// same signature. Failures and fallback text are logged and dropped.
    pub async fn try_prewarm(&self, analyzer: &dyn DeepAnalyzer, fortunes: &Fortunes) {
        let Some(signature) = signature_of(fortunes) else {
            debug!(subsystem = "cache", "Prewarm skipped: no primary reading");
            return;
        };
        let Some(_guard) = self.begin(&signature) else {
            debug!(subsystem = "cache", signature = %signature, "Prewarm skipped: already in flight");
            return;
        };

        let start = std::time::Instant::now();
        match analyzer.analyze(fortunes).await {
            Ok(analysis) if analysis.is_cacheable() => {
                let response_len = analysis.text.len();
                self.insert(signature.clone(), analysis.text);
                info!(
                    subsystem = "cache",
                    signature = %signature,
                    response_len,
                    cache_size = self.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Prewarm cached"
                );
            }
            Ok(_) => {
                warn!(
                    subsystem = "cache",
                    signature = %signature,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Prewarm produced no cacheable analysis"
                );
            }
            Err(e) => {
                warn!(
                    subsystem = "cache",
                    signature = %signature,
                    error = %e,
                    "Prewarm failed"
                );
            }
        }
    }
}

/// Clears the in-flight mark when dropped, whatever the outcome.
struct InFlightGuard {
    cache: PrewarmCache,
    signature: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.cache.state().in_flight.remove(&self.signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use fortune_core::{fortunes_from_primary, DeepAnalysis, Error, Result, ShortReading};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fortunes(face: &str, career: &str, blessing: &str) -> Fortunes {
        fortunes_from_primary(ShortReading::new(face, career, blessing))
    }

    /// Analyzer returning a fixed result after a delay, counting calls.
    struct FixedAnalyzer {
        result: std::result::Result<DeepAnalysis, String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedAnalyzer {
        fn ok(text: &str) -> Self {
            Self {
                result: Ok(DeepAnalysis {
                    text: text.to_string(),
                    providers: vec!["Gemini".to_string()],
                }),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeepAnalyzer for FixedAnalyzer {
        async fn analyze(&self, _fortunes: &Fortunes) -> Result<DeepAnalysis> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.result.clone().map_err(Error::Inference)
        }
    }

    #[test]
    fn test_signature_is_deterministic() {
        let a = signature_of(&fortunes("A", "B", "C")).unwrap();
        let b = signature_of(&fortunes("A", "B", "C")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_signature_ignores_attribution() {
        let mut attributed = ShortReading::new("A", "B", "C");
        attributed.source = Some("ai".into());
        attributed.model = Some("grok-4-fast".into());
        assert_eq!(
            signature_of(&fortunes_from_primary(attributed)),
            signature_of(&fortunes("A", "B", "C"))
        );
    }

    #[test]
    fn test_signature_ignores_other_providers() {
        let mut with_other = fortunes("A", "B", "C");
        with_other.insert("gemini".into(), Some(ShortReading::new("X", "Y", "Z")));
        assert_eq!(
            signature_of(&with_other),
            signature_of(&fortunes("A", "B", "C"))
        );
    }

    #[test]
    fn test_signature_changes_with_each_field() {
        let base = signature_of(&fortunes("A", "B", "C"));
        assert_ne!(base, signature_of(&fortunes("A2", "B", "C")));
        assert_ne!(base, signature_of(&fortunes("A", "B2", "C")));
        assert_ne!(base, signature_of(&fortunes("A", "B", "C2")));
        // Values do not leak between fields.
        assert_ne!(
            signature_of(&fortunes("A", "B", "C")),
            signature_of(&fortunes("B", "A", "C"))
        );
    }

    #[test]
    fn test_signature_absent_without_primary() {
        assert!(signature_of(&Fortunes::new()).is_none());
        assert!(signature_of(&fortunes("", " ", "")).is_none());

        let mut only_legacy = Fortunes::new();
        only_legacy.insert("gemini".into(), Some(ShortReading::new("A", "B", "C")));
        only_legacy.insert("grok".into(), None);
        assert!(signature_of(&only_legacy).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_fresh_until_ttl() {
        let ttl = Duration::from_secs(900);
        let content = fortunes("A", "B", "C");
        let signature = signature_of(&content).unwrap();
        let epsilon = Duration::from_millis(1);

        let cache = PrewarmCache::new(ttl, 8);
        let written = Instant::now();
        cache.insert_at(signature.clone(), "X", written);
        assert_eq!(
            cache.take_at(&content, written + ttl - epsilon).as_deref(),
            Some("X")
        );

        let cache = PrewarmCache::new(ttl, 8);
        cache.insert_at(signature, "X", written);
        assert_eq!(cache.take_at(&content, written + ttl + epsilon), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_with_advancing_clock() {
        let cache = PrewarmCache::new(Duration::from_secs(60), 8);
        let content = fortunes("A", "B", "C");
        cache.insert(signature_of(&content).unwrap(), "X");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.take(&content), None);
    }

    #[tokio::test]
    async fn test_take_pops() {
        let cache = PrewarmCache::default();
        let content = fortunes("A", "B", "C");
        cache.insert(signature_of(&content).unwrap(), "X");

        assert_eq!(cache.take(&content).as_deref(), Some("X"));
        assert_eq!(cache.take(&content), None);
    }

    #[tokio::test]
    async fn test_take_without_signature() {
        let cache = PrewarmCache::default();
        assert_eq!(cache.take(&Fortunes::new()), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest_first() {
        let cache = PrewarmCache::new(Duration::from_secs(900), 3);
        let start = Instant::now();
        for i in 0..5u64 {
            cache.insert_at(format!("sig-{}", i), format!("text-{}", i), start + Duration::from_secs(i));
            assert!(cache.len() <= 3);
        }

        let state = cache.state();
        let mut kept: Vec<&String> = state.entries.keys().collect();
        kept.sort();
        assert_eq!(kept, vec!["sig-2", "sig-3", "sig-4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_garbage_collection_drops_expired_before_evicting() {
        let cache = PrewarmCache::new(Duration::from_secs(10), 2);
        let start = Instant::now();
        cache.insert_at("old", "1", start);
        cache.insert_at("new", "2", start + Duration::from_secs(5));

        cache.collect_garbage(start + Duration::from_secs(11));
        assert_eq!(cache.len(), 1);
        assert!(cache.state().entries.contains_key("new"));
    }

    #[tokio::test]
    async fn test_prewarm_caches_success() {
        let cache = PrewarmCache::default();
        let analyzer = FixedAnalyzer::ok("X");
        let content = fortunes("A", "B", "C");

        cache.try_prewarm(&analyzer, &content).await;

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(cache.take(&content).as_deref(), Some("X"));
        assert!(!cache.is_in_flight(&signature_of(&content).unwrap()));
    }

    #[tokio::test]
    async fn test_prewarm_skips_fallback_and_marker_text() {
        let cache = PrewarmCache::default();
        let content = fortunes("A", "B", "C");

        let fallback = FixedAnalyzer {
            result: Ok(DeepAnalysis::fallback()),
            ..FixedAnalyzer::ok("")
        };
        cache.try_prewarm(&fallback, &content).await;
        assert!(cache.is_empty());

        cache.try_prewarm(&FixedAnalyzer::ok("分析失败了"), &content).await;
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_prewarm_error_clears_in_flight() {
        let cache = PrewarmCache::default();
        let content = fortunes("A", "B", "C");
        let failing = FixedAnalyzer {
            result: Err("boom".to_string()),
            ..FixedAnalyzer::ok("")
        };

        cache.try_prewarm(&failing, &content).await;

        assert!(cache.is_empty());
        assert!(!cache.is_in_flight(&signature_of(&content).unwrap()));
    }

    #[tokio::test]
    async fn test_prewarm_without_signature_makes_no_call() {
        let cache = PrewarmCache::default();
        let analyzer = FixedAnalyzer::ok("X");
        cache.try_prewarm(&analyzer, &Fortunes::new()).await;
        assert_eq!(analyzer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_prewarms_share_one_call() {
        let cache = PrewarmCache::default();
        let analyzer = Arc::new(FixedAnalyzer {
            delay: Duration::from_secs(5),
            ..FixedAnalyzer::ok("X")
        });
        let content = fortunes("A", "B", "C");

        let first = {
            let (cache, analyzer, content) = (cache.clone(), analyzer.clone(), content.clone());
            tokio::spawn(async move { cache.try_prewarm(analyzer.as_ref(), &content).await })
        };
        tokio::task::yield_now().await;
        assert!(cache.is_in_flight(&signature_of(&content).unwrap()));

        cache.try_prewarm(analyzer.as_ref(), &content).await;
        first.await.unwrap();

        assert_eq!(analyzer.calls(), 1);
        assert_eq!(cache.take(&content).as_deref(), Some("X"));
    }
}
