//! SQLite implementation of ICatalogGateway
//!
//! ## Type Mapping
//!
//! | Domain Type  | SQL Type | Strategy                                 |
//! |--------------|----------|------------------------------------------|
//! | RomId        | INTEGER  | `get()` / `RomId::new()`                 |
//! | PlatformId   | INTEGER  | `get()` / `PlatformId::new()`            |
//! | PathBuf      | TEXT     | lossy UTF-8 string                       |
//! | ContentHash  | TEXT     | `as_str()`, stored raw and validated on resolve |

use std::path::PathBuf;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use retrosync_core::domain::{ContentHash, PlatformId, RomId};
use retrosync_core::ports::{CatalogError, CatalogPlatform, CatalogRom, ICatalogGateway, RomFilter};

use crate::CacheError;

/// A ROM record to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRom {
    pub title: String,
    pub platform_id: PlatformId,
    pub file_name: String,
    pub file_path: PathBuf,
    pub content_hash: Option<ContentHash>,
}

/// SQLite-backed ROM catalog and settings store
#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    /// Creates a new catalog with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // Platforms
    // ========================================================================

    pub async fn insert_platform(
        &self,
        short_name: &str,
        name: &str,
    ) -> Result<PlatformId, CacheError> {
        let result = sqlx::query("INSERT INTO platforms (short_name, name) VALUES (?, ?)")
            .bind(short_name)
            .bind(name)
            .execute(&self.pool)
            .await?;

        let id = PlatformId::new(result.last_insert_rowid());
        tracing::debug!(platform_id = %id, short_name, "Inserted platform");
        Ok(id)
    }

    /// Case-insensitive lookup by short name
    pub async fn platform_by_short_name(
        &self,
        short_name: &str,
    ) -> Result<Option<CatalogPlatform>, CacheError> {
        let row = sqlx::query("SELECT * FROM platforms WHERE short_name = ? COLLATE NOCASE")
            .bind(short_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(platform_from_row))
    }

    pub async fn list_platforms(&self) -> Result<Vec<CatalogPlatform>, CacheError> {
        let rows = sqlx::query("SELECT * FROM platforms ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(platform_from_row).collect())
    }

    // ========================================================================
    // ROMs
    // ========================================================================

    pub async fn insert_rom(&self, rom: &NewRom) -> Result<RomId, CacheError> {
        let result = sqlx::query(
            "INSERT INTO roms (title, platform_id, file_name, file_path, file_content_hash) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&rom.title)
        .bind(rom.platform_id.get())
        .bind(&rom.file_name)
        .bind(rom.file_path.to_string_lossy().into_owned())
        .bind(rom.content_hash.as_ref().map(|h| h.as_str().to_string()))
        .execute(&self.pool)
        .await?;

        let id = RomId::new(result.last_insert_rowid());
        tracing::debug!(rom_id = %id, file_name = %rom.file_name, "Inserted ROM");
        Ok(id)
    }

    async fn fetch_rom(&self, id: RomId) -> Result<Option<CatalogRom>, CacheError> {
        let row = sqlx::query("SELECT * FROM roms WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(rom_from_row))
    }

    async fn query_roms(&self, filter: &RomFilter) -> Result<Vec<CatalogRom>, CacheError> {
        let mut sql = String::from("SELECT * FROM roms WHERE 1=1");

        if filter.platform_id.is_some() {
            sql.push_str(" AND platform_id = ?");
        }
        if filter.file_name.is_some() {
            sql.push_str(" AND file_name = ?");
        }
        if filter.search.is_some() {
            sql.push_str(" AND title LIKE ? ESCAPE '\\'");
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(platform_id) = filter.platform_id {
            query = query.bind(platform_id.get());
        }
        if let Some(ref file_name) = filter.file_name {
            query = query.bind(file_name.clone());
        }
        if let Some(ref search) = filter.search {
            query = query.bind(format!("%{}%", escape_like(search)));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(rom_from_row).collect())
    }

    async fn fetch_platform(&self, id: PlatformId) -> Result<Option<CatalogPlatform>, CacheError> {
        let row = sqlx::query("SELECT * FROM platforms WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(platform_from_row))
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.get("value")))
    }

    /// Inserts or replaces a setting
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), CacheError> {
        sqlx::query(
            "INSERT INTO settings (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, \
             updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!(key, "Setting saved");
        Ok(())
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn rom_from_row(row: &SqliteRow) -> CatalogRom {
    let file_path: String = row.get("file_path");
    CatalogRom {
        id: RomId::new(row.get("id")),
        title: row.get("title"),
        platform_id: PlatformId::new(row.get("platform_id")),
        file_name: row.get("file_name"),
        file_path: PathBuf::from(file_path),
        file_content_hash: row.get("file_content_hash"),
    }
}

fn platform_from_row(row: &SqliteRow) -> CatalogPlatform {
    CatalogPlatform {
        id: PlatformId::new(row.get("id")),
        short_name: row.get("short_name"),
        name: row.get("name"),
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn store_error(e: CacheError) -> CatalogError {
    CatalogError::StoreUnavailable(e.to_string())
}

// ============================================================================
// ICatalogGateway implementation
// ============================================================================

#[async_trait::async_trait]
impl ICatalogGateway for SqliteCatalog {
    async fn get_by_id(&self, id: RomId) -> Result<CatalogRom, CatalogError> {
        self.fetch_rom(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| CatalogError::NotFound(format!("ROM {id}")))
    }

    async fn get_all(&self, filter: &RomFilter) -> Result<Vec<CatalogRom>, CatalogError> {
        self.query_roms(filter).await.map_err(store_error)
    }

    async fn get_platform_by_id(&self, id: PlatformId) -> Result<CatalogPlatform, CatalogError> {
        self.fetch_platform(id)
            .await
            .map_err(store_error)?
            .ok_or_else(|| CatalogError::NotFound(format!("platform {id}")))
    }
}
