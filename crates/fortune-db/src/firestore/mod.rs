//! Firestore backend for share records.
//!
//! Talks to the Firestore REST API (or its emulator) with `reqwest`:
//! whole-document replace on create, masked merge on update, and a
//! server-side `REQUEST_TIME` transform for timestamps. Requests carry a
//! static bearer token or one minted from a service-account key.

pub mod auth;
pub mod codec;
mod store;

pub use auth::{ServiceAccountKey, ServiceAccountTokenSource, DATASTORE_SCOPE, GOOGLE_TOKEN_URI};
pub use store::{FirestoreConfig, FirestoreShareStore, FIRESTORE_BASE_URL, SERVER_TIMESTAMP_SENTINEL};
