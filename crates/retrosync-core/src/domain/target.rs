//! Per-invocation sync inputs
//!
//! [`SyncTarget`] and [`BackupSet`] are rebuilt from catalog and device
//! state on every sync; neither is persisted.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::entry::Subtree;
use super::newtypes::{ContentHash, PlatformId, RomId};

/// A catalog ROM resolved for one sync operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTarget {
    pub id: RomId,
    pub title: String,
    pub platform_id: PlatformId,
    /// Short name of the platform (`snes`, `gba`, ...)
    pub platform_short_name: String,
    /// Full platform name, used to pick the playlist filename
    pub platform_name: String,
    /// Device core directory (`snes9x`); `None` when the platform has no
    /// known core, which disables save backup and restore for the ROM
    pub core_directory: Option<String>,
    pub content_hash: ContentHash,
    pub local_file_path: PathBuf,
    /// Name of the file under the device's `downloads/` directory
    pub device_file_name: String,
}

impl SyncTarget {
    /// Device file name without its last extension
    ///
    /// Save and state files on the device share this prefix
    /// (`mario.sfc` -> `mario.srm`, `mario.state1`).
    pub fn device_base_name(&self) -> &str {
        base_name(&self.device_file_name)
    }
}

/// Strip the last extension from a file name
///
/// A leading dot is not treated as an extension separator.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// One ROM's saved-state bundle in the backup store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSet {
    pub key: Option<ContentHash>,
    /// Leaf file names under `saves/`, sorted
    pub saves: Vec<String>,
    /// Leaf file names under `states/`, sorted
    pub states: Vec<String>,
}

impl BackupSet {
    pub fn new(key: ContentHash) -> Self {
        Self {
            key: Some(key),
            saves: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Zero files in both subtrees counts as no backup at all
    pub fn is_empty(&self) -> bool {
        self.saves.is_empty() && self.states.is_empty()
    }

    pub fn file_count(&self) -> usize {
        self.saves.len() + self.states.len()
    }

    pub fn files(&self, subtree: Subtree) -> &[String] {
        match subtree {
            Subtree::Saves => &self.saves,
            Subtree::States => &self.states,
        }
    }

    pub fn files_mut(&mut self, subtree: Subtree) -> &mut Vec<String> {
        match subtree {
            Subtree::Saves => &mut self.saves,
            Subtree::States => &mut self.states,
        }
    }

    /// Paths relative to the key directory, `saves/` before `states/`
    pub fn relative_paths(&self) -> Vec<String> {
        Subtree::ALL
            .iter()
            .flat_map(|subtree| {
                self.files(*subtree)
                    .iter()
                    .map(move |name| format!("{}/{name}", subtree.dir_name()))
            })
            .collect()
    }
}
