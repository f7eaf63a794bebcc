//! `SQLite` storage for the read path using `SQLx`.
//!
//! - Connection pooling, one pool per store
//! - Schema created idempotently on open (no migration files)
//! - Array filters bound as one JSON array and expanded with `json_each`

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{Error, Result};

mod lessons;
mod members;
mod schema;
mod users;

/// All repositories over one `SQLite` pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (and initialize) the database at `db_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Database` if the connection or schema creation fails.
    pub async fn open(db_url: &str) -> Result<Self> {
        let pool = schema::create_connection_pool(db_url).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if missing.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        schema::init_schema(&pool).await?;
        tracing::debug!("lesson store ready");
        Ok(Self { pool })
    }

    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Bind value for `IN (SELECT value FROM json_each(?))`.
fn json_array<T: serde::Serialize>(values: &[T]) -> Result<String> {
    serde_json::to_string(values)
        .map_err(|e| Error::invalid_argument(format!("Failed to encode filter values: {e}")))
}

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

fn from_millis(column: &str, millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::invalid_data(format!("{column} out of range: {millis}")))
}

fn to_count(column: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::invalid_data(format!("{column} out of range: {value}")))
}
