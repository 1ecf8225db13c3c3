//! Process configuration read from the environment.
//!
//! Every value has a default; malformed numbers fall back to the default
//! rather than failing startup. See `ApiConfig::from_env` for the full list
//! of variables.

use std::path::Path;
use std::time::Duration;

use tracing::warn;

use fortune_core::defaults::{
    AI_API_BASE_URL, DEEP_MODEL, DEEP_PROVIDER_NAME, DEEP_TIMEOUT_SECS, FIRESTORE_COLLECTION,
    PREWARM_MAX_ENTRIES, PREWARM_TTL, RETRY_BASE_DELAY, RETRY_MAX_ATTEMPTS, SHARE_TABLE,
    SHORT_MODEL, SHORT_TIMEOUT_SECS,
};
use fortune_core::RetryPolicy;
use fortune_db::{FirestoreConfig, ServiceAccountKey, StorageBackendKind, StorageSettings};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Service-account key file read when no credential variable is set.
const DEFAULT_CREDENTIALS_PATH: &str = "config/firebase-credentials.json";

/// One deep-analysis provider: display name and model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepModelSpec {
    pub name: String,
    pub model: String,
}

/// Everything the server needs at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub ai_base_url: String,
    /// Generation credential. Generation endpoints answer 503 without it.
    pub ai_token: Option<String>,
    pub short_model: String,
    pub short_timeout: Duration,
    pub deep_models: Vec<DeepModelSpec>,
    pub deep_timeout: Duration,
    pub deep_retry: RetryPolicy,
    pub prewarm_ttl: Duration,
    pub prewarm_max_entries: usize,
    /// Empty means any origin.
    pub allowed_origins: Vec<String>,
    pub storage: StorageSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ApiConfig {
    /// Read configuration from the process environment.
    ///
    /// Variables:
    /// - `HOST`, `PORT`
    /// - `AI_API_BASE_URL`, `AI_BUILDER_TOKEN` (or `VITE_AI_API_TOKEN`)
    /// - `AI_MODEL_GROK`, `AI_MODEL_GEMINI`, `DEEP_MODELS` (`Name=model,...`)
    /// - `DEEP_MAX_ATTEMPTS`, `DEEP_RETRY_BASE_DELAY_MS`, `DEEP_RETRY_MAX_DELAY_MS`
    /// - `DEEP_TIMEOUT_SECS`, `SHORT_TIMEOUT_SECS`
    /// - `PREWARM_TTL_SECS`, `PREWARM_MAX_ENTRIES`
    /// - `ALLOWED_ORIGINS`
    /// - `SHARE_STORAGE_BACKEND`, `SHARE_DATABASE_URL`, `SHARE_TABLE`
    /// - `FIRESTORE_PROJECT_ID`, `FIRESTORE_ACCESS_TOKEN`,
    ///   `FIRESTORE_EMULATOR_HOST`, `FIRESTORE_COLLECTION`
    /// - `FIREBASE_CREDENTIALS` (service-account JSON) or
    ///   `FIREBASE_CREDENTIALS_PATH` (key file)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |key: &str, default: u64| -> u64 {
            match get(key) {
                Some(raw) => raw.parse().unwrap_or_else(|_| {
                    warn!(key, value = %raw, default, "Invalid numeric setting, using default");
                    default
                }),
                None => default,
            }
        };
        let count = |key: &str, default: u64| -> u64 {
            match number(key, default) {
                0 => {
                    warn!(key, default, "Zero is not a usable setting, using default");
                    default
                }
                n => n,
            }
        };
        let attempts = |key: &str, default: u32| -> u32 {
            let raw = count(key, u64::from(default));
            u32::try_from(raw).unwrap_or_else(|_| {
                warn!(key, value = raw, default, "Setting out of range, using default");
                default
            })
        };
        let capacity = |key: &str, default: usize| -> usize {
            let raw = count(key, default as u64);
            usize::try_from(raw).unwrap_or_else(|_| {
                warn!(key, value = raw, default, "Setting out of range, using default");
                default
            })
        };

        let ai_token = get("AI_BUILDER_TOKEN").or_else(|| get("VITE_AI_API_TOKEN"));
        let deep_model = get("AI_MODEL_GEMINI").unwrap_or_else(|| DEEP_MODEL.to_string());
        let deep_models = get("DEEP_MODELS")
            .map(|raw| parse_deep_models(&raw))
            .filter(|models| !models.is_empty())
            .unwrap_or_else(|| {
                vec![DeepModelSpec {
                    name: DEEP_PROVIDER_NAME.to_string(),
                    model: deep_model,
                }]
            });

        let deep_retry = RetryPolicy::new()
            .max_attempts(attempts("DEEP_MAX_ATTEMPTS", RETRY_MAX_ATTEMPTS))
            .base_delay(Duration::from_millis(number(
                "DEEP_RETRY_BASE_DELAY_MS",
                RETRY_BASE_DELAY.as_millis() as u64,
            )))
            .max_delay(
                get("DEEP_RETRY_MAX_DELAY_MS")
                    .and_then(|v| v.parse().ok())
                    .map(Duration::from_millis),
            );

        let kind = match get("SHARE_STORAGE_BACKEND") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to automatic storage selection");
                StorageBackendKind::Auto
            }),
            None => StorageBackendKind::Auto,
        };

        let mut firestore = FirestoreConfig {
            project_id: get("FIRESTORE_PROJECT_ID"),
            collection: get("FIRESTORE_COLLECTION")
                .unwrap_or_else(|| FIRESTORE_COLLECTION.to_string()),
            access_token: get("FIRESTORE_ACCESS_TOKEN"),
            ..FirestoreConfig::default()
        };
        if let Some(key) = load_service_account(
            get("FIREBASE_CREDENTIALS"),
            get("FIREBASE_CREDENTIALS_PATH"),
        ) {
            firestore = firestore.with_service_account(key);
        }
        if let Some(host) = get("FIRESTORE_EMULATOR_HOST") {
            firestore = firestore.with_emulator(&host);
        }

        let storage = StorageSettings {
            kind,
            database_url: get("SHARE_DATABASE_URL"),
            table: get("SHARE_TABLE").unwrap_or_else(|| SHARE_TABLE.to_string()),
            firestore,
            ..StorageSettings::default()
        };

        Self {
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            ai_base_url: get("AI_API_BASE_URL").unwrap_or_else(|| AI_API_BASE_URL.to_string()),
            ai_token,
            short_model: get("AI_MODEL_GROK").unwrap_or_else(|| SHORT_MODEL.to_string()),
            short_timeout: Duration::from_secs(number("SHORT_TIMEOUT_SECS", SHORT_TIMEOUT_SECS)),
            deep_models,
            deep_timeout: Duration::from_secs(number("DEEP_TIMEOUT_SECS", DEEP_TIMEOUT_SECS)),
            deep_retry,
            prewarm_ttl: Duration::from_secs(number("PREWARM_TTL_SECS", PREWARM_TTL.as_secs())),
            prewarm_max_entries: capacity("PREWARM_MAX_ENTRIES", PREWARM_MAX_ENTRIES),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            storage,
        }
    }

    /// Whether generation credentials are present.
    pub fn token_configured(&self) -> bool {
        self.ai_token.is_some()
    }
}

/// Load a service-account key from inline JSON, else from a key file.
///
/// An explicit path that cannot be read is reported; the default path is
/// only tried when it exists.
fn load_service_account(json: Option<String>, path: Option<String>) -> Option<ServiceAccountKey> {
    let loaded = match (json, path) {
        (Some(raw), _) => ServiceAccountKey::from_json(&raw),
        (None, Some(path)) => ServiceAccountKey::from_file(&path),
        (None, None) if Path::new(DEFAULT_CREDENTIALS_PATH).exists() => {
            ServiceAccountKey::from_file(DEFAULT_CREDENTIALS_PATH)
        }
        (None, None) => return None,
    };
    match loaded {
        Ok(key) => Some(key),
        Err(e) => {
            warn!(error = %e, "Ignoring Firestore service-account credentials");
            None
        }
    }
}

/// Parse `Name=model-id,Other=model-id`. Entries without `=` use the model
/// id as the display name.
pub fn parse_deep_models(raw: &str) -> Vec<DeepModelSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (name, model) = match entry.split_once('=') {
                Some((name, model)) => (name.trim(), model.trim()),
                None => (entry, entry),
            };
            if name.is_empty() || model.is_empty() {
                warn!(entry, "Ignoring malformed DEEP_MODELS entry");
                return None;
            }
            Some(DeepModelSpec {
                name: name.to_string(),
                model: model.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ApiConfig {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ApiConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.ai_base_url, AI_API_BASE_URL);
        assert!(!config.token_configured());
        assert_eq!(config.short_model, SHORT_MODEL);
        assert_eq!(
            config.deep_models,
            vec![DeepModelSpec {
                name: "Gemini".into(),
                model: DEEP_MODEL.into()
            }]
        );
        assert_eq!(config.deep_retry, RetryPolicy::default());
        assert_eq!(config.prewarm_ttl, Duration::from_secs(900));
        assert_eq!(config.prewarm_max_entries, 256);
        assert_eq!(config.storage.kind, StorageBackendKind::Auto);
        assert_eq!(config.storage.table, "share_records");
        assert!(config.storage.firestore.project_id.is_none());
    }

    #[test]
    fn test_token_fallback_variable() {
        let config = config_from(&[("VITE_AI_API_TOKEN", "vite-token")]);
        assert_eq!(config.ai_token.as_deref(), Some("vite-token"));

        let config = config_from(&[
            ("AI_BUILDER_TOKEN", "primary"),
            ("VITE_AI_API_TOKEN", "vite-token"),
        ]);
        assert_eq!(config.ai_token.as_deref(), Some("primary"));
    }

    #[test]
    fn test_blank_token_is_unset() {
        let config = config_from(&[("AI_BUILDER_TOKEN", "   ")]);
        assert!(!config.token_configured());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[
            ("PORT", "eighty"),
            ("PREWARM_TTL_SECS", "-5"),
            ("DEEP_MAX_ATTEMPTS", "many"),
        ]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.prewarm_ttl, PREWARM_TTL);
        assert_eq!(config.deep_retry.max_attempts, RETRY_MAX_ATTEMPTS);
    }

    #[test]
    fn test_zero_and_oversized_counts_fall_back() {
        let config = config_from(&[
            ("PREWARM_MAX_ENTRIES", "0"),
            ("DEEP_MAX_ATTEMPTS", "4294967296"),
        ]);
        assert_eq!(config.prewarm_max_entries, PREWARM_MAX_ENTRIES);
        assert_eq!(config.deep_retry.max_attempts, RETRY_MAX_ATTEMPTS);

        let config = config_from(&[("PREWARM_MAX_ENTRIES", "16"), ("DEEP_MAX_ATTEMPTS", "0")]);
        assert_eq!(config.prewarm_max_entries, 16);
        assert_eq!(config.deep_retry.max_attempts, RETRY_MAX_ATTEMPTS);
    }

    #[test]
    fn test_retry_settings() {
        let config = config_from(&[
            ("DEEP_MAX_ATTEMPTS", "2"),
            ("DEEP_RETRY_BASE_DELAY_MS", "250"),
            ("DEEP_RETRY_MAX_DELAY_MS", "1000"),
        ]);
        assert_eq!(config.deep_retry.max_attempts, 2);
        assert_eq!(config.deep_retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.deep_retry.max_delay, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_deep_models_list() {
        let models = parse_deep_models("Gemini=gemini-3-flash-preview, Grok=grok-4-fast,,bare");
        assert_eq!(models.len(), 3);
        assert_eq!(models[1].name, "Grok");
        assert_eq!(models[1].model, "grok-4-fast");
        assert_eq!(models[2].name, "bare");
        assert!(parse_deep_models("=x,y=").is_empty());
    }

    #[test]
    fn test_single_gemini_model_override() {
        let config = config_from(&[("AI_MODEL_GEMINI", "gemini-2.5-pro")]);
        assert_eq!(config.deep_models[0].model, "gemini-2.5-pro");
    }

    #[test]
    fn test_storage_settings() {
        let config = config_from(&[
            ("SHARE_STORAGE_BACKEND", "postgres"),
            ("SHARE_DATABASE_URL", "postgres://u:p@db/share"),
            ("SHARE_TABLE", "shares"),
            ("FIRESTORE_PROJECT_ID", "demo"),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8080"),
        ]);
        assert_eq!(config.storage.kind, StorageBackendKind::Postgres);
        assert_eq!(
            config.storage.database_url.as_deref(),
            Some("postgres://u:p@db/share")
        );
        assert_eq!(config.storage.table, "shares");
        assert_eq!(config.storage.firestore.project_id.as_deref(), Some("demo"));
        assert_eq!(config.storage.firestore.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_inline_service_account_credentials() {
        let credentials = r#"{"type": "service_account", "project_id": "from-key",
            "client_email": "svc@from-key.iam.gserviceaccount.com", "private_key": "pem"}"#;
        let config = config_from(&[("FIREBASE_CREDENTIALS", credentials)]);
        let firestore = &config.storage.firestore;
        assert_eq!(firestore.project_id.as_deref(), Some("from-key"));
        assert_eq!(
            firestore.service_account.as_ref().map(|k| k.client_email.as_str()),
            Some("svc@from-key.iam.gserviceaccount.com")
        );

        let config = config_from(&[
            ("FIREBASE_CREDENTIALS", credentials),
            ("FIRESTORE_PROJECT_ID", "explicit"),
        ]);
        assert_eq!(config.storage.firestore.project_id.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_unreadable_credentials_are_ignored() {
        let config = config_from(&[
            ("FIREBASE_CREDENTIALS_PATH", "/nonexistent/firebase-credentials.json"),
        ]);
        assert!(config.storage.firestore.service_account.is_none());

        let config = config_from(&[("FIREBASE_CREDENTIALS", "{not json")]);
        assert!(config.storage.firestore.service_account.is_none());
    }

    #[test]
    fn test_emulator_drops_credentials() {
        let config = config_from(&[
            ("FIRESTORE_ACCESS_TOKEN", "static"),
            ("FIREBASE_CREDENTIALS", r#"{"client_email": "svc@demo", "private_key": "pem"}"#),
            ("FIRESTORE_EMULATOR_HOST", "localhost:8080"),
        ]);
        assert!(config.storage.firestore.access_token.is_none());
        assert!(config.storage.firestore.service_account.is_none());
    }

    #[test]
    fn test_unknown_backend_is_auto() {
        let config = config_from(&[("SHARE_STORAGE_BACKEND", "mongo")]);
        assert_eq!(config.storage.kind, StorageBackendKind::Auto);
    }

    #[test]
    fn test_allowed_origins() {
        let config = config_from(&[("ALLOWED_ORIGINS", "https://a.example, https://b.example")]);
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
