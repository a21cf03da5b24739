//! Domain entities and business rules
//!
//! This module contains the core domain types for RetroSync:
//! - Newtypes for validated identifiers and device paths
//! - Device listing entries and their directory classification
//! - Sync targets and backup sets
//! - Phase results and the aggregate sync log
//! - Domain-specific error types

pub mod entry;
pub mod errors;
pub mod newtypes;
pub mod phase;
pub mod target;

// Re-export commonly used types
pub use entry::{classify_is_directory, RemoteEntry, Subtree};
pub use errors::{DomainError, RemoteError};
pub use newtypes::*;
pub use phase::{Phase, PhaseAction, PhaseResult, PhaseStatus, SyncLog};
pub use target::{base_name, BackupSet, SyncTarget};
