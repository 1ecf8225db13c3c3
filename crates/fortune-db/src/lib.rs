//! # fortune-db
//!
//! Share record storage for the fortune-teller service.
//!
//! This crate provides:
//! - A PostgreSQL backend storing each record as one JSONB row
//! - A Firestore backend over the REST API
//! - An in-process backend for tests and local runs
//! - Connection pool management and URL normalization
//! - Startup-time backend selection with fallback
//!
//! ## Example
//!
//! ```rust,ignore
//! use fortune_db::{select_store, StorageSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = select_store(&StorageSettings::default()).await?;
//!     let record = store.get("abc12345").await?;
//!     println!("{} found: {}", store.backend_name(), record.is_some());
//!     Ok(())
//! }
//! ```
pub mod firestore;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod schema_validation;
pub mod selection;
pub mod test_fixtures;

pub use firestore::{
    FirestoreConfig, FirestoreShareStore, ServiceAccountKey, SERVER_TIMESTAMP_SENTINEL,
};
pub use memory::MemoryShareStore;
pub use pool::{create_pool_with_config, normalize_database_url, PoolConfig};
pub use postgres::PgShareStore;
pub use schema_validation::validate_table_name;
pub use selection::{select_store, StorageBackendKind, StorageSettings};

// Re-export core types for convenience
pub use fortune_core::{Document, Error, Result, ShareStore};
