//! Shared application state.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use fortune_core::defaults::SHORT_PROVIDER;
use fortune_core::{DeepAnalyzer, Result, ShareStore};
use fortune_db::select_store;
use fortune_inference::{DeepProvider, OpenAIBackend, OpenAIConfig, ProviderInvoker, ShortReadingClient};

use crate::config::ApiConfig;
use crate::services::{DeepAnalysisService, PrewarmCache};

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub deep: DeepAnalysisService,
    /// `None` when no generation credentials are configured.
    pub short_reader: Option<ShortReadingClient>,
    /// Provider key → model id, reported by the health endpoint.
    pub models: Arc<BTreeMap<String, String>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ShareStore>,
        short_reader: Option<ShortReadingClient>,
        analyzer: Option<Arc<dyn DeepAnalyzer>>,
        cache: PrewarmCache,
        models: BTreeMap<String, String>,
    ) -> Self {
        Self {
            deep: DeepAnalysisService::new(store, analyzer, cache),
            short_reader,
            models: Arc::new(models),
        }
    }

    /// Build backends and the share store from configuration.
    ///
    /// The store is selected once here. Generation clients are only built
    /// when a token is configured.
    pub async fn from_config(config: &ApiConfig) -> Result<Self> {
        let store = select_store(&config.storage).await?;

        let mut models = BTreeMap::new();
        models.insert(SHORT_PROVIDER.to_string(), config.short_model.clone());
        for spec in &config.deep_models {
            models.insert(spec.name.to_lowercase(), spec.model.clone());
        }

        let (short_reader, analyzer) = match config.ai_token {
            Some(ref token) => {
                let short = OpenAIBackend::new(
                    OpenAIConfig::new(&config.ai_base_url, &config.short_model)
                        .with_api_key(Some(token.clone()))
                        .with_timeout_secs(config.short_timeout.as_secs()),
                )?;

                let providers = config
                    .deep_models
                    .iter()
                    .map(|spec| {
                        let backend = OpenAIBackend::new(
                            OpenAIConfig::new(&config.ai_base_url, &spec.model)
                                .with_api_key(Some(token.clone()))
                                .with_timeout_secs(config.deep_timeout.as_secs()),
                        )?;
                        Ok(DeepProvider::new(spec.name.clone(), Arc::new(backend)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                let invoker =
                    ProviderInvoker::new(providers).with_retry_policy(config.deep_retry.clone());

                (
                    Some(ShortReadingClient::new(Arc::new(short))),
                    Some(Arc::new(invoker) as Arc<dyn DeepAnalyzer>),
                )
            }
            None => (None, None),
        };

        info!(
            subsystem = "api",
            backend = store.backend_name(),
            storage_available = store.is_available(),
            token_configured = short_reader.is_some(),
            deep_providers = config.deep_models.len(),
            prewarm_ttl_secs = config.prewarm_ttl.as_secs(),
            prewarm_max_entries = config.prewarm_max_entries,
            "Application state ready"
        );

        Ok(Self::new(
            store,
            short_reader,
            analyzer,
            PrewarmCache::new(config.prewarm_ttl, config.prewarm_max_entries),
            models,
        ))
    }

    pub fn token_configured(&self) -> bool {
        self.short_reader.is_some()
    }

    pub fn store(&self) -> &Arc<dyn ShareStore> {
        self.deep.store()
    }
}
