//! Firestore share store over the REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value as JsonValue};
use tracing::{debug, info};

use fortune_core::defaults::FIRESTORE_COLLECTION;
use fortune_core::{Document, Error, Result, RetryPolicy, ShareStore};

use super::auth::{ServiceAccountKey, ServiceAccountTokenSource};
use super::codec::{decode_fields, encode_fields, field_path};

/// Production Firestore REST endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";

/// Value returned by [`FirestoreShareStore::server_timestamp`].
///
/// Top-level fields holding it are written as a `REQUEST_TIME` transform
/// instead of a literal.
pub const SERVER_TIMESTAMP_SENTINEL: &str = "__firestore_request_time__";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Firestore connection settings.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project id. The store reports unavailable without one.
    pub project_id: Option<String>,
    pub database: String,
    pub collection: String,
    /// Static OAuth2 bearer token. Takes precedence over `service_account`.
    pub access_token: Option<String>,
    /// Service-account key used to mint and refresh access tokens.
    pub service_account: Option<ServiceAccountKey>,
    pub base_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            database: "(default)".to_string(),
            collection: FIRESTORE_COLLECTION.to_string(),
            access_token: None,
            service_account: None,
            base_url: FIRESTORE_BASE_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Authenticate with a service account. Also supplies the project id
    /// when none is set.
    pub fn with_service_account(mut self, key: ServiceAccountKey) -> Self {
        if self.project_id.is_none() {
            self.project_id = key.project_id.clone();
        }
        self.service_account = Some(key);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Point at a local emulator (`host:port`). The emulator takes no
    /// credentials.
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.access_token = None;
        self.service_account = None;
        self.with_base_url(format!("http://{}/v1", host.trim_end_matches('/')))
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Share store backed by a Firestore collection.
#[derive(Debug, Clone)]
pub struct FirestoreShareStore {
    client: Client,
    config: FirestoreConfig,
    /// Present when authenticating with a service account.
    token_source: Option<Arc<ServiceAccountTokenSource>>,
}

impl FirestoreShareStore {
    pub fn new(config: FirestoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build Firestore client: {}", e)))?;
        let token_source = match (&config.access_token, &config.service_account) {
            (None, Some(key)) => Some(Arc::new(ServiceAccountTokenSource::new(
                key.clone(),
                client.clone(),
            )?)),
            _ => None,
        };
        Ok(Self {
            client,
            config,
            token_source,
        })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn project(&self) -> Result<&str> {
        self.config
            .project_id
            .as_deref()
            .ok_or_else(|| Error::Config("Firestore project id is not configured".to_string()))
    }

    /// `projects/{p}/databases/{d}/documents` as path segments.
    fn documents_url(&self, tail: &[&str]) -> Result<Url> {
        let project = self.project()?;
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| Error::Config(format!("Invalid Firestore base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("Firestore base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["projects", project, "databases", &self.config.database])
            .extend(tail);
        Ok(url)
    }

    fn document_name(&self, id: &str) -> Result<String> {
        Ok(format!(
            "projects/{}/databases/{}/documents/{}/{}",
            self.project()?,
            self.config.database,
            self.config.collection,
            id
        ))
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        if let Some(token) = &self.config.access_token {
            return Ok(request.bearer_auth(token));
        }
        match &self.token_source {
            Some(source) => Ok(request.bearer_auth(source.access_token().await?)),
            None => Ok(request),
        }
    }

    /// Split sentinel-valued fields out into `REQUEST_TIME` transforms.
    fn split_transforms(document: Document) -> (Document, Vec<JsonValue>) {
        let mut transforms = Vec::new();
        let mut plain = Document::new();
        for (key, value) in document {
            if value.as_str() == Some(SERVER_TIMESTAMP_SENTINEL) {
                transforms.push(json!({
                    "fieldPath": field_path(&key),
                    "setToServerValue": "REQUEST_TIME",
                }));
            } else {
                plain.insert(key, value);
            }
        }
        (plain, transforms)
    }

    async fn commit(&self, write: JsonValue) -> Result<()> {
        let url = self.documents_url(&["documents:commit"])?;
        let body = json!({ "writes": [write] });

        self.config
            .retry
            .run("firestore.commit", |_| self.send_commit(&url, &body))
            .await
    }

    async fn send_commit(&self, url: &Url, body: &JsonValue) -> Result<()> {
        let response = self
            .authorize(self.client.post(url.clone()))
            .await?
            .json(body)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }

    async fn fetch(&self, url: &Url) -> Result<Option<JsonValue>> {
        let response = self
            .authorize(self.client.get(url.clone()))
            .await?
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        Ok(Some(response.json::<JsonValue>().await?))
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(Error::UpstreamStatus {
        status: status.as_u16(),
        message,
    })
}

/// Document ids may not contain path separators or be `.`/`..`.
fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && id != "." && id != ".."
}

#[async_trait]
impl ShareStore for FirestoreShareStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    fn is_available(&self) -> bool {
        self.config.project_id.is_some()
    }

    async fn create(&self, id: &str, document: Document) -> Result<()> {
        if !is_valid_document_id(id) {
            return Err(Error::InvalidInput(format!("Invalid share id: {:?}", id)));
        }
        let (plain, transforms) = Self::split_transforms(document);
        let mut write = json!({
            "update": {
                "name": self.document_name(id)?,
                "fields": encode_fields(&plain),
            }
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = JsonValue::Array(transforms);
        }

        self.commit(write).await?;
        info!(subsystem = "store", backend = "firestore", share_id = %id, "Share record created");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        if !is_valid_document_id(id) {
            return Ok(None);
        }
        let url = self.documents_url(&["documents", &self.config.collection, id])?;
        let found = self
            .config
            .retry
            .run("firestore.get", |_| self.fetch(&url))
            .await?;

        match found {
            None => {
                debug!(subsystem = "store", backend = "firestore", share_id = %id, "Share record not found");
                Ok(None)
            }
            Some(body) => {
                let fields = body.get("fields").unwrap_or(&JsonValue::Null);
                let document = decode_fields(fields)?;
                if document.is_empty() {
                    debug!(subsystem = "store", backend = "firestore", share_id = %id, "Share record is empty");
                    return Ok(None);
                }
                Ok(Some(document))
            }
        }
    }

    async fn update(&self, id: &str, fields: Document) -> Result<()> {
        if !is_valid_document_id(id) {
            return Err(Error::ShareNotFound(id.to_string()));
        }
        let (plain, transforms) = Self::split_transforms(fields);
        let mask: Vec<String> = plain.keys().map(|k| field_path(k)).collect();

        let mut write = json!({
            "update": {
                "name": self.document_name(id)?,
                "fields": encode_fields(&plain),
            },
            "updateMask": { "fieldPaths": mask },
            "currentDocument": { "exists": true },
        });
        if !transforms.is_empty() {
            write["updateTransforms"] = JsonValue::Array(transforms);
        }

        match self.commit(write).await {
            Ok(()) => {
                debug!(subsystem = "store", backend = "firestore", share_id = %id, "Share record merged");
                Ok(())
            }
            Err(Error::UpstreamStatus { status: 404, .. }) => {
                Err(Error::ShareNotFound(id.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    fn server_timestamp(&self) -> JsonValue {
        JsonValue::String(SERVER_TIMESTAMP_SENTINEL.to_string())
    }
}
