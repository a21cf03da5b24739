//! RetroSync Sync - five-phase device resynchronization
//!
//! Provides:
//! - A content-hash keyed local store for device save and state files
//! - The RetroArch playlist builder
//! - The orchestrator running backup, clear, push, playlists and restore
//!
//! ## Modules
//!
//! - [`backup_store`] - [`SaveBackupStore`], `<root>/<hash>/{saves,states}`
//! - [`playlist`] - [`RetroArchPlaylists`], platform table and `.lpl` documents
//! - [`orchestrator`] - [`SyncOrchestrator`], the five-phase workflow and push

pub mod backup_store;
pub mod orchestrator;
pub mod playlist;

use thiserror::Error;

pub use backup_store::{BackupError, SaveBackupStore};
pub use orchestrator::{PushReport, SyncOrchestrator};
pub use playlist::RetroArchPlaylists;

/// Errors that abort a sync before any phase runs
///
/// Everything that goes wrong once phases are running is recorded in the
/// returned `SyncLog` instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// None of the requested ROM ids could be resolved
    #[error("No valid ROMs to sync: {}", .errors.join("; "))]
    NoValidRoms {
        /// One entry per id that failed to resolve
        errors: Vec<String>,
    },
}
