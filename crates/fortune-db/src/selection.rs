//! Startup-time selection of the share store backend.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use fortune_core::defaults::SHARE_TABLE;
use fortune_core::{Error, Result, ShareStore};

use crate::firestore::{FirestoreConfig, FirestoreShareStore};
use crate::pool::PoolConfig;
use crate::postgres::PgShareStore;

/// Which backend the operator asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    Firestore,
    Postgres,
    /// PostgreSQL when a database URL is configured, otherwise Firestore.
    #[default]
    Auto,
}

impl FromStr for StorageBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" | "firebase" => Ok(Self::Firestore),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "auto" | "" => Ok(Self::Auto),
            other => Err(Error::Config(format!(
                "Unknown share storage backend '{}' (expected firestore, postgres or auto)",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Firestore => "firestore",
            Self::Postgres => "postgres",
            Self::Auto => "auto",
        };
        f.write_str(name)
    }
}

/// Everything needed to build either backend.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub kind: StorageBackendKind,
    pub database_url: Option<String>,
    pub table: String,
    pub pool: PoolConfig,
    pub firestore: FirestoreConfig,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            kind: StorageBackendKind::Auto,
            database_url: None,
            table: SHARE_TABLE.to_string(),
            pool: PoolConfig::default(),
            firestore: FirestoreConfig::default(),
        }
    }
}

/// Build the share store once for the life of the process.
///
/// A PostgreSQL backend that cannot connect or set up its table falls back
/// to Firestore rather than failing startup.
pub async fn select_store(settings: &StorageSettings) -> Result<Arc<dyn ShareStore>> {
    let database_url = settings
        .database_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty());

    let want_postgres = match settings.kind {
        StorageBackendKind::Firestore => false,
        StorageBackendKind::Postgres => {
            if database_url.is_none() {
                warn!(
                    subsystem = "store",
                    "Postgres backend requested without SHARE_DATABASE_URL, using Firestore"
                );
            }
            database_url.is_some()
        }
        StorageBackendKind::Auto => database_url.is_some(),
    };

    if let (true, Some(url)) = (want_postgres, database_url) {
        match PgShareStore::connect(url, &settings.table, settings.pool.clone()).await {
            Ok(store) => {
                info!(
                    subsystem = "store",
                    backend = "postgres",
                    requested = %settings.kind,
                    table = %settings.table,
                    "Share storage selected"
                );
                return Ok(Arc::new(store));
            }
            Err(e) => {
                warn!(
                    subsystem = "store",
                    backend = "postgres",
                    error = %e,
                    "Postgres share storage unavailable, falling back to Firestore"
                );
            }
        }
    }

    let store = match FirestoreShareStore::new(settings.firestore.clone()) {
        Ok(store) => store,
        Err(e) => {
            warn!(
                subsystem = "store",
                backend = "firestore",
                error = %e,
                "Firestore credentials rejected, share storage disabled"
            );
            FirestoreShareStore::new(FirestoreConfig {
                project_id: None,
                service_account: None,
                ..settings.firestore.clone()
            })?
        }
    };
    if store.is_available() {
        info!(
            subsystem = "store",
            backend = "firestore",
            requested = %settings.kind,
            collection = %settings.firestore.collection,
            "Share storage selected"
        );
    } else {
        warn!(
            subsystem = "store",
            backend = "firestore",
            "Firestore project id not set, share storage disabled"
        );
    }
    Ok(Arc::new(store))
}
