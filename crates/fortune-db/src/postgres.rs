//! PostgreSQL share store.
//!
//! Each record is one row holding the whole document in a JSONB column.
//! Updates merge with the native `||` operator, so fields not named in the
//! update survive untouched.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use fortune_core::{Document, Error, Result, ShareStore};

use crate::pool::{create_pool_with_config, PoolConfig};
use crate::schema_validation::validate_table_name;

/// Share store backed by a single PostgreSQL table.
#[derive(Clone)]
pub struct PgShareStore {
    pool: PgPool,
    table: String,
}

impl PgShareStore {
    /// Connect, normalize the URL, and make sure the share table exists.
    pub async fn connect(database_url: &str, table: &str, config: PoolConfig) -> Result<Self> {
        validate_table_name(table)?;
        let pool = create_pool_with_config(database_url, config).await?;
        let store = Self {
            pool,
            table: table.to_string(),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool. The table is not created.
    pub fn from_pool(pool: PgPool, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the share table if it is missing.
    ///
    /// Deployments may grant DML on an existing table without `CREATE`
    /// privilege; a failed `CREATE TABLE` is accepted when the catalog shows
    /// the table is already there.
    pub async fn ensure_schema(&self) -> Result<()> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
            self.table
        );

        match sqlx::query(&ddl).execute(&self.pool).await {
            Ok(_) => {
                debug!(subsystem = "store", backend = "postgres", table = %self.table, "Share table ready");
                Ok(())
            }
            Err(create_err) => {
                if self.table_exists().await? {
                    warn!(
                        subsystem = "store",
                        backend = "postgres",
                        table = %self.table,
                        error = %create_err,
                        "CREATE TABLE failed but table exists, continuing"
                    );
                    Ok(())
                } else {
                    Err(Error::Database(create_err))
                }
            }
        }
    }

    async fn table_exists(&self) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT to_regclass($1) IS NOT NULL")
            .bind(&self.table)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }
}

#[async_trait]
impl ShareStore for PgShareStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    fn is_available(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn create(&self, id: &str, document: Document) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (id, data) VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
            self.table
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(JsonValue::Object(document))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        info!(subsystem = "store", backend = "postgres", share_id = %id, "Share record created");
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let sql = format!("SELECT data FROM {} WHERE id = $1", self.table);
        let data: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        match data {
            None => Ok(None),
            Some(JsonValue::Object(doc)) => Ok(Some(doc)),
            Some(other) => Err(Error::Storage(format!(
                "Share {} holds a non-object document: {}",
                id, other
            ))),
        }
    }

    async fn update(&self, id: &str, fields: Document) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET data = data || $2::jsonb, updated_at = NOW() WHERE id = $1",
            self.table
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(JsonValue::Object(fields))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ShareNotFound(id.to_string()));
        }
        debug!(subsystem = "store", backend = "postgres", share_id = %id, "Share record merged");
        Ok(())
    }

    /// There is no server-side sentinel for JSONB contents, so the
    /// application clock is written as an RFC 3339 string.
    fn server_timestamp(&self) -> JsonValue {
        JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}
