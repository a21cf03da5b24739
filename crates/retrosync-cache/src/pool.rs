//! Catalog database pool
//!
//! Opens the SQLite file (WAL, foreign keys on), applies the embedded schema
//! and hands out a shared [`SqlitePool`]. `in_memory` gives tests a private
//! database on a single connection.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::CacheError;

const SCHEMA: &str = include_str!("migrations/20260601_initial.sql");

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool of SQLite connections to the catalog database
pub struct DatabasePool {
    pool: SqlitePool,
}

impl DatabasePool {
    /// Opens (creating if needed) the catalog at `db_path` and migrates it
    ///
    /// # Errors
    ///
    /// `CacheError::ConnectionFailed` when the file or its directory cannot
    /// be opened, `CacheError::MigrationFailed` when the schema fails to apply.
    pub async fn new(db_path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CacheError::ConnectionFailed(format!("{}: {e}", parent.display()))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = Self::connect(options, MAX_CONNECTIONS).await?;
        tracing::info!(path = %db_path.display(), "Catalog database opened");
        Ok(pool)
    }

    /// Private in-memory catalog, schema applied and platforms seeded
    ///
    /// Limited to one connection; a second one would see a different,
    /// empty database.
    ///
    /// # Errors
    ///
    /// Same as [`DatabasePool::new`].
    pub async fn in_memory() -> Result<Self, CacheError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?
            .foreign_keys(true);

        let pool = Self::connect(options, 1).await?;
        tracing::debug!("In-memory catalog initialized");
        Ok(pool)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn connect(options: SqliteConnectOptions, max: u32) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max)
            .connect_with(options)
            .await
            .map_err(|e| CacheError::ConnectionFailed(e.to_string()))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| CacheError::MigrationFailed(e.to_string()))?;

        Ok(Self { pool })
    }
}
