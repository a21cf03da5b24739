//! Playlist materializer port
//!
//! Pure transformation from a platform and its selected ROMs into the
//! playlist document the device frontend reads. No I/O.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::SyncTarget;

/// Errors building a playlist
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("Unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("Playlist serialization failed: {0}")]
    Serialization(String),
}

/// A playlist document (`.lpl`, JSON)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    pub version: String,
    pub default_core_path: String,
    pub default_core_name: String,
    pub label_display_mode: u8,
    pub right_thumbnail_mode: u8,
    pub left_thumbnail_mode: u8,
    pub sort_mode: u8,
    pub items: Vec<PlaylistEntry>,
}

impl PlaylistDocument {
    /// Pretty-printed JSON, the form the device frontend writes itself
    pub fn to_bytes(&self) -> Result<Vec<u8>, PlaylistError> {
        serde_json::to_vec_pretty(self).map_err(|e| PlaylistError::Serialization(e.to_string()))
    }
}

/// One game in a playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub path: String,
    pub label: String,
    pub core_path: String,
    pub core_name: String,
    pub crc32: String,
    pub db_name: String,
}

/// Port trait for playlist generation
pub trait IPlaylistMaterializer: Send + Sync {
    /// Build the playlist for one platform group
    fn build(
        &self,
        platform_short_name: &str,
        roms: &[SyncTarget],
    ) -> Result<PlaylistDocument, PlaylistError>;

    /// Playlist file name for a full platform name
    fn filename_for(&self, platform_name: &str) -> String;

    /// Device core directory holding the platform's saves and states
    fn core_directory_for(&self, platform_short_name: &str) -> Option<String>;
}
