//! Device listing entries
//!
//! The device's `list` endpoint is inconsistent about how it marks
//! directories. Some firmware builds set an explicit `isDirectory` flag,
//! some send `type: "directory"`, and some only append a slash to the
//! `path` or `name`. [`classify_is_directory`] is the single place that
//! interprets those signals.

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Subtree
// ============================================================================

/// Which half of a save backup an entry belongs to
///
/// Assigned by the caller that issued the listing, never by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subtree {
    /// Battery saves (`saves/<core>/`)
    Saves,
    /// Emulator save states (`states/<core>/`)
    States,
}

impl Subtree {
    /// Both subtrees, in backup order
    pub const ALL: [Subtree; 2] = [Subtree::Saves, Subtree::States];

    /// Directory name of the subtree, on the device and in the backup store
    pub fn dir_name(&self) -> &'static str {
        match self {
            Subtree::Saves => "saves",
            Subtree::States => "states",
        }
    }
}

impl fmt::Display for Subtree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Decide whether a raw listing entry denotes a directory
///
/// Signals are checked in this order, and any positive one wins:
///
/// 1. explicit `isDirectory` flag
/// 2. `type` field equal to `"directory"` (case-insensitive)
/// 3. trailing slash on the entry's `path`
/// 4. trailing slash on the entry's `name`
///
/// A `false` flag does not veto a later positive signal. No single field is
/// reliable across firmware versions.
pub fn classify_is_directory(
    is_directory_flag: Option<bool>,
    type_field: Option<&str>,
    path: Option<&str>,
    name: &str,
) -> bool {
    if is_directory_flag == Some(true) {
        return true;
    }
    if type_field.is_some_and(|t| t.eq_ignore_ascii_case("directory")) {
        return true;
    }
    if path.is_some_and(|p| p.ends_with('/')) {
        return true;
    }
    name.ends_with('/')
}

// ============================================================================
// RemoteEntry
// ============================================================================

/// One classified entry of a device directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Leaf name, without any trailing slash
    pub name: String,
    /// Result of [`classify_is_directory`]
    pub is_directory: bool,
    /// Set by callers listing `saves/<core>/` or `states/<core>/`
    pub source_subtree: Option<Subtree>,
}

impl RemoteEntry {
    /// Creates a file entry
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: false,
            source_subtree: None,
        }
    }

    /// Creates a directory entry
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_directory: true,
            source_subtree: None,
        }
    }

    /// Tags the entry with the subtree it was listed from
    pub fn with_subtree(mut self, subtree: Subtree) -> Self {
        self.source_subtree = Some(subtree);
        self
    }

    /// Dot-files, including `.` and `..`
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }

    /// A regular, visible file
    pub fn is_visible_file(&self) -> bool {
        !self.is_directory && !self.is_hidden()
    }
}
