//! # fortune-core
//!
//! Core types, traits, and abstractions for the fortune-teller share service.
//!
//! This crate provides the data model for readings and share records, the
//! store and generation traits that backends implement, the shared retry
//! policy, and the structured logging vocabulary.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod retry;
pub mod share_id;
pub mod traits;
pub mod visualization;

// Re-export commonly used types at crate root
pub use error::{is_retriable_status, Error, Result};
pub use models::*;
pub use retry::RetryPolicy;
pub use share_id::new_share_id;
pub use traits::*;
