//! Service-account credentials for the Firestore REST API.
//!
//! Signs an RS256 JWT assertion with the account's private key and trades it
//! at the token endpoint for an OAuth2 access token. Tokens are cached and
//! refreshed shortly before they expire.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use fortune_core::{Error, Result};

/// Google's OAuth2 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Scope granting Firestore read/write.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// Refresh this long before the reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

/// The fields of a service-account key file that token minting needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    /// PEM-encoded RSA private key.
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid service account JSON: {}", e)))
    }

    /// Read and parse a key file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read credentials {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Mints and caches access tokens for one service account.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ServiceAccountTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountTokenSource")
            .field("client_email", &self.key.client_email)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountTokenSource {
    /// Fails when the private key is not a valid RSA PEM.
    pub fn new(key: ServiceAccountKey, client: Client) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid service account private key: {}", e)))?;
        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    /// Return a valid access token, refreshing it when close to expiry.
    ///
    /// Concurrent callers wait on the same refresh.
    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.token.clone());
            }
            debug!(subsystem = "store", backend = "firestore", "Access token due for refresh");
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn assertion(&self) -> Result<String> {
        let iat = chrono::Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.key.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::Config(format!("Failed to sign token assertion: {}", e)))
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let assertion = self.assertion()?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response.json().await?;
        info!(
            subsystem = "store",
            backend = "firestore",
            client_email = %self.key.client_email,
            expires_in_secs = body.expires_in,
            "Access token minted"
        );
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(REFRESH_MARGIN);
        Ok(CachedToken {
            token: body.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}
