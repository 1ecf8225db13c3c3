//! Database connection pool management.

use std::time::{Duration, Instant};

use reqwest::Url;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use fortune_core::{Error, Result};

/// Default maximum number of connections in the pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// sslmode values that already enforce transport encryption.
const ENCRYPTED_SSLMODES: &[&str] = &["require", "verify-ca", "verify-full"];

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections to maintain.
    pub min_connections: u32,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Idle connection timeout duration.
    pub idle_timeout: Duration,
    /// Maximum connection lifetime.
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            min_connections: 0,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            max_lifetime: Some(Duration::from_secs(1800)), // 30 minutes
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of connections.
    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    /// Set the minimum number of connections.
    pub fn min_connections(mut self, n: u32) -> Self {
        self.min_connections = n;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the maximum connection lifetime.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }
}

/// Normalize a PostgreSQL connection string before connecting.
///
/// - `sslmode` is forced to `require` unless it already demands encryption.
/// - Hosts whose first label starts with `ep-` (Neon-style managed endpoints,
///   also used behind Koyeb) get `options=endpoint=<label>` so the proxy can
///   route without SNI, unless an endpoint option is already present.
pub fn normalize_database_url(database_url: &str) -> Result<String> {
    let mut url = Url::parse(database_url.trim())
        .map_err(|e| Error::Config(format!("Invalid database URL: {}", e)))?;

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

    let encrypted = pairs
        .iter()
        .any(|(k, v)| k == "sslmode" && ENCRYPTED_SSLMODES.contains(&v.as_str()));
    if !encrypted {
        pairs.retain(|(k, _)| k != "sslmode");
        pairs.push(("sslmode".to_string(), "require".to_string()));
    }

    let endpoint = url
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| label.starts_with("ep-"))
        .map(str::to_string);

    if let Some(endpoint) = endpoint {
        let routing = format!("endpoint={}", endpoint);
        match pairs.iter_mut().find(|(k, _)| k == "options") {
            Some((_, v)) if v.contains("endpoint=") => {}
            Some((_, v)) => *v = format!("{} {}", routing, v),
            None => pairs.push(("options".to_string(), routing)),
        }
    }

    url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    Ok(url.to_string())
}

/// Connection string with credentials masked, for logs.
pub fn redact_database_url(database_url: &str) -> String {
    match Url::parse(database_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.set_query(None);
            url.to_string()
        }
        Err(_) => "(unparseable)".to_string(),
    }
}

/// Create a new PostgreSQL connection pool with custom configuration.
///
/// The URL is normalized with [`normalize_database_url`] first.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let normalized = normalize_database_url(database_url)?;

    info!(
        subsystem = "store",
        component = "pool",
        op = "create",
        url = %redact_database_url(&normalized),
        max_connections = config.max_connections,
        connect_timeout_secs = config.connect_timeout.as_secs(),
        "Creating database connection pool"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(config.idle_timeout);

    if let Some(max_lifetime) = config.max_lifetime {
        options = options.max_lifetime(max_lifetime);
    }

    let pool = options
        .connect(&normalized)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "store",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}
