//! In-process share store.
//!
//! Keeps documents in a map behind a mutex. Used by tests and by local runs
//! without any database configured.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value as JsonValue;

use fortune_core::{Document, Error, Result, ShareStore};

/// Share store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryShareStore {
    records: Mutex<HashMap<String, Document>>,
}

impl MemoryShareStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Document>> {
        // A poisoned map still holds consistent documents.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Snapshot of a record without going through the async trait.
    pub fn snapshot(&self, id: &str) -> Option<Document> {
        self.records().get(id).cloned()
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn create(&self, id: &str, document: Document) -> Result<()> {
        self.records().insert(id.to_string(), document);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.records().get(id).cloned())
    }

    async fn update(&self, id: &str, fields: Document) -> Result<()> {
        let mut records = self.records();
        let existing = records
            .get_mut(id)
            .ok_or_else(|| Error::ShareNotFound(id.to_string()))?;
        existing.extend(fields);
        Ok(())
    }

    fn server_timestamp(&self) -> JsonValue {
        JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: JsonValue) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let store = MemoryShareStore::new();
        store
            .create("abc123", doc(json!({"fortunes": {"grok": {"face": "a"}}})))
            .await
            .unwrap();

        let created = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(created["fortunes"]["grok"]["face"], json!("a"));

        store
            .update("abc123", doc(json!({"analysis_l2": "done"})))
            .await
            .unwrap();
        let updated = store.get("abc123").await.unwrap().unwrap();
        assert_eq!(updated["analysis_l2"], json!("done"));
        assert_eq!(updated["fortunes"]["grok"]["face"], json!("a"));
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found() {
        let store = MemoryShareStore::new();
        let err = store
            .update("missing", doc(json!({"analysis_l2": "x"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ShareNotFound(id) if id == "missing"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_id_is_none() {
        assert!(MemoryShareStore::new().get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_replaces_whole_document() {
        let store = MemoryShareStore::new();
        store.create("id", doc(json!({"a": 1, "b": 2}))).await.unwrap();
        store.create("id", doc(json!({"c": 3}))).await.unwrap();
        assert_eq!(store.snapshot("id").unwrap(), doc(json!({"c": 3})));
    }
}
