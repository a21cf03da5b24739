//! Catalog gateway port (driven/secondary port)
//!
//! Read access to the local ROM catalog. The catalog is a plain CRUD store;
//! the sync core only needs lookups by id, a filtered listing, and the
//! platform of a ROM.
//!
//! ## Design Notes
//!
//! - Errors are classified (`NotFound` vs `StoreUnavailable`) because the
//!   orchestrator treats an unresolvable id differently from a broken store.
//! - `CatalogRom` is a port-level DTO; the orchestrator maps it to
//!   [`SyncTarget`](crate::domain::SyncTarget).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::{PlatformId, RomId};

/// Errors returned by catalog lookups
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Not found in catalog: {0}")]
    NotFound(String),

    #[error("Catalog store unavailable: {0}")]
    StoreUnavailable(String),
}

/// A ROM record as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRom {
    pub id: RomId,
    pub title: String,
    pub platform_id: PlatformId,
    /// File name used on disk and on the device
    pub file_name: String,
    /// Absolute path of the ROM file on the local machine
    pub file_path: PathBuf,
    /// Raw content hash as stored; validated when the ROM is resolved
    pub file_content_hash: Option<String>,
}

/// A platform record as stored in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPlatform {
    pub id: PlatformId,
    /// Short identifier (`snes`, `gba`), the key of the core mapping
    pub short_name: String,
    /// Display name (`Super Nintendo Entertainment System`)
    pub name: String,
}

/// Filter criteria for listing ROMs
///
/// All fields are optional; when `None`, no filtering is applied for that field.
/// Multiple filters are combined with AND logic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomFilter {
    pub platform_id: Option<PlatformId>,
    /// Exact file name match
    pub file_name: Option<String>,
    /// Substring match on the title
    pub search: Option<String>,
}

impl RomFilter {
    /// Creates a new empty filter (matches all ROMs)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform_id: PlatformId) -> Self {
        self.platform_id = Some(platform_id);
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.platform_id.is_none() && self.file_name.is_none() && self.search.is_none()
    }

    /// Evaluates the filter against a record
    ///
    /// Adapters that cannot push the filter down to storage use this.
    pub fn matches(&self, rom: &CatalogRom) -> bool {
        if self.platform_id.is_some_and(|p| p != rom.platform_id) {
            return false;
        }
        if self.file_name.as_deref().is_some_and(|f| f != rom.file_name) {
            return false;
        }
        if let Some(search) = &self.search {
            if !rom.title.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

/// Port trait for catalog reads
#[async_trait::async_trait]
pub trait ICatalogGateway: Send + Sync {
    /// Look up a ROM by its catalog id
    async fn get_by_id(&self, id: RomId) -> Result<CatalogRom, CatalogError>;

    /// List ROMs matching the filter, ordered by title
    async fn get_all(&self, filter: &RomFilter) -> Result<Vec<CatalogRom>, CatalogError>;

    /// Look up a platform by its catalog id
    async fn get_platform_by_id(&self, id: PlatformId) -> Result<CatalogPlatform, CatalogError>;
}
