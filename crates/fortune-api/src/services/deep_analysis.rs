//! Deep-analysis orchestration.
//!
//! Ties the speculative cache, the provider invoker and the share store
//! together for the three paths that need a deep analysis:
//!
//! - **preview**: after a short reading, generate in the background and park
//!   the result in the [`PrewarmCache`];
//! - **persist**: when a share is created, reuse a parked result or schedule
//!   a backfill that writes `analysis_l2` once generated;
//! - **on demand**: return the durable `analysis_l2`, or generate it now and
//!   write it back.
//!
//! Background work runs on detached tasks; their errors are logged, never
//! returned to a client.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value as JsonValue;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use fortune_core::models::fields;
use fortune_core::{
    new_share_id, normalize_fortunes, visualization, DeepAnalyzer, Document, Error, Fortunes,
    Result, ShareRecord, ShareStore,
};

use super::prewarm_cache::PrewarmCache;

/// Result of an on-demand analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub analysis: String,
    /// True when served from the record's durable field.
    pub cached: bool,
}

/// A newly persisted share.
#[derive(Debug)]
pub struct CreatedShare {
    pub id: String,
    /// Whether the record was written with a prewarmed analysis.
    pub prewarmed: bool,
    /// Backfill scheduled because no prewarmed analysis was available.
    pub backfill: Option<JoinHandle<()>>,
}

struct DeepAnalysisServiceInner {
    store: Arc<dyn ShareStore>,
    /// `None` when no generation credentials are configured.
    analyzer: Option<Arc<dyn DeepAnalyzer>>,
    cache: PrewarmCache,
}

/// Coordinates deep-analysis generation, caching and persistence.
#[derive(Clone)]
pub struct DeepAnalysisService {
    inner: Arc<DeepAnalysisServiceInner>,
}

impl DeepAnalysisService {
    pub fn new(
        store: Arc<dyn ShareStore>,
        analyzer: Option<Arc<dyn DeepAnalyzer>>,
        cache: PrewarmCache,
    ) -> Self {
        Self {
            inner: Arc::new(DeepAnalysisServiceInner {
                store,
                analyzer,
                cache,
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn ShareStore> {
        &self.inner.store
    }

    pub fn cache(&self) -> &PrewarmCache {
        &self.inner.cache
    }

    pub fn generation_enabled(&self) -> bool {
        self.inner.analyzer.is_some()
    }

    fn require_store(&self) -> Result<&Arc<dyn ShareStore>> {
        if !self.inner.store.is_available() {
            return Err(Error::Config("Share storage not configured".to_string()));
        }
        Ok(&self.inner.store)
    }

    /// Start a speculative generation for these fortunes.
    ///
    /// Returns `None` when generation is disabled.
    pub fn spawn_prewarm(&self, fortunes: Fortunes) -> Option<JoinHandle<()>> {
        let analyzer = self.inner.analyzer.clone()?;
        let cache = self.inner.cache.clone();
        Some(tokio::spawn(async move {
            cache.try_prewarm(analyzer.as_ref(), &fortunes).await;
        }))
    }

    /// Persist a new share record.
    ///
    /// The visualization payload is converted to storage form. A prewarmed
    /// analysis for the same reading is written with the record; otherwise a
    /// backfill is scheduled and the record is returned without one.
    pub async fn create_share(&self, record: ShareRecord) -> Result<CreatedShare> {
        let store = self.require_store()?;
        let total = Instant::now();
        let id = new_share_id();

        let encode = Instant::now();
        let viz_landmarks = record
            .visualization_data
            .as_ref()
            .map(visualization::landmark_count)
            .unwrap_or(0);
        let fortunes = record.fortunes.clone();
        let prewarmed = match self.inner.analyzer {
            Some(_) => self.inner.cache.take(&fortunes),
            None => None,
        };
        let record = ShareRecord {
            visualization_data: record
                .visualization_data
                .as_ref()
                .map(visualization::encode_for_storage),
            analysis_l2: prewarmed.clone(),
            ..record
        };
        let mut document = record.into_document()?;
        document.insert(fields::CREATED_AT.to_string(), store.server_timestamp());
        let encode_ms = encode.elapsed().as_millis() as u64;
        let doc_bytes = serde_json::to_vec(&document).map(|b| b.len()).unwrap_or(0);

        let write = Instant::now();
        if let Err(e) = store.create(&id, document).await {
            error!(
                subsystem = "share",
                op = "create",
                share_id = %id,
                backend = store.backend_name(),
                encode_ms,
                store_ms = write.elapsed().as_millis() as u64,
                total_ms = total.elapsed().as_millis() as u64,
                doc_bytes,
                viz_landmarks,
                error = %e,
                "Share persist failed"
            );
            return Err(e);
        }

        info!(
            subsystem = "share",
            op = "create",
            share_id = %id,
            backend = store.backend_name(),
            prewarmed = prewarmed.is_some(),
            encode_ms,
            store_ms = write.elapsed().as_millis() as u64,
            total_ms = total.elapsed().as_millis() as u64,
            doc_bytes,
            viz_landmarks,
            "Share persisted"
        );

        let backfill = if prewarmed.is_none() && self.generation_enabled() {
            Some(self.spawn_backfill(id.clone()))
        } else {
            None
        };

        Ok(CreatedShare {
            id,
            prewarmed: prewarmed.is_some(),
            backfill,
        })
    }

    /// Read a share for display: visualization decoded, fortunes normalized.
    pub async fn get_share(&self, id: &str) -> Result<Option<ShareRecord>> {
        let store = self.require_store()?;
        let Some(document) = store.get(id).await? else {
            return Ok(None);
        };
        let mut record = ShareRecord::from_document(&document);
        record.visualization_data = record
            .visualization_data
            .as_ref()
            .map(visualization::decode_from_storage);
        Ok(Some(record))
    }

    /// Return the durable analysis for a share, generating it if missing.
    ///
    /// `Ok(None)` when the share does not exist or holds no reading to
    /// analyze. Whatever the analyzer returns is written back, fallback
    /// included, so a second call never regenerates.
    pub async fn compute_and_cache(&self, share_id: &str) -> Result<Option<AnalysisOutcome>> {
        let store = self.require_store()?;
        let analyzer = self
            .inner
            .analyzer
            .as_ref()
            .ok_or_else(|| Error::Config("AI token not configured".to_string()))?;

        let Some(document) = store.get(share_id).await? else {
            debug!(subsystem = "share", share_id = %share_id, "Analysis requested for unknown share");
            return Ok(None);
        };

        if let Some(analysis) = durable_analysis(&document) {
            debug!(subsystem = "share", share_id = %share_id, cached = true, "Analysis served from record");
            return Ok(Some(AnalysisOutcome {
                analysis,
                cached: true,
            }));
        }

        let record = ShareRecord::from_document(&document);
        let fortunes = normalize_fortunes(Some(record.fortunes), None);
        if fortunes.is_empty() {
            warn!(subsystem = "share", share_id = %share_id, "Share holds no readings to analyze");
            return Ok(None);
        }

        let start = Instant::now();
        let analysis = analyzer.analyze(&fortunes).await?;
        let mut update = Document::new();
        update.insert(
            fields::ANALYSIS_L2.to_string(),
            JsonValue::String(analysis.text.clone()),
        );
        store.update(share_id, update).await?;
        if analysis.is_fallback() {
            warn!(
                subsystem = "share",
                op = "analyze",
                share_id = %share_id,
                duration_ms = start.elapsed().as_millis() as u64,
                "All providers failed; fallback analysis stored"
            );
        } else {
            info!(
                subsystem = "share",
                op = "analyze",
                share_id = %share_id,
                response_len = analysis.text.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Analysis generated and stored"
            );
        }

        Ok(Some(AnalysisOutcome {
            analysis: analysis.text,
            cached: false,
        }))
    }

    /// Generate and store the analysis for a share in the background.
    pub fn spawn_backfill(&self, share_id: String) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            match service.compute_and_cache(&share_id).await {
                Ok(Some(outcome)) => info!(
                    subsystem = "share",
                    op = "backfill",
                    share_id = %share_id,
                    cached = outcome.cached,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Backfill complete"
                ),
                Ok(None) => warn!(
                    subsystem = "share",
                    op = "backfill",
                    share_id = %share_id,
                    "Backfill found nothing to analyze"
                ),
                Err(e) => warn!(
                    subsystem = "share",
                    op = "backfill",
                    share_id = %share_id,
                    error = %e,
                    "Backfill failed"
                ),
            }
        })
    }
}

fn durable_analysis(document: &Document) -> Option<String> {
    document
        .get(fields::ANALYSIS_L2)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
