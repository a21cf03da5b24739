//! RetroSync Cache - Local ROM catalog
//!
//! SQLite-based storage for:
//! - Platforms (seeded with every platform that has a known core)
//! - ROM records with their local file path and content hash
//! - Persisted settings such as the device address
//!
//! ## Architecture
//!
//! This crate implements the `ICatalogGateway` port from `retrosync-core`
//! using SQLite as the storage backend. It is a driven (secondary) adapter
//! in the hexagonal architecture.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteCatalog`] - `ICatalogGateway` implementation plus write helpers
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use retrosync_cache::{DatabasePool, SqliteCatalog};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/retrosync/catalog.db")).await?;
//! let catalog = SqliteCatalog::new(pool.pool().clone());
//! // Use catalog as ICatalogGateway...
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod pool;

pub use catalog::{NewRom, SqliteCatalog};
pub use pool::DatabasePool;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
