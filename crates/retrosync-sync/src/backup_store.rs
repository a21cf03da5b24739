//! Content-hash keyed store of device save and state files
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<content-hash>/saves/<file>
//! <root>/<content-hash>/states/<file>
//! ```
//!
//! A backup is written into `<root>/.staging-<hash>` first and swapped into
//! place once every download has succeeded. A failed backup leaves the
//! previous key directory untouched.

use std::path::{Path, PathBuf};

use retrosync_core::domain::{BackupSet, ContentHash, DevicePath, RemoteError, Subtree};
use retrosync_core::ports::UploadBody;
use retrosync_device::RemoteStorageClient;
use thiserror::Error;
use tracing::{debug, info, warn};

const STAGING_PREFIX: &str = ".staging-";

/// Errors raised by the backup store
#[derive(Debug, Error)]
pub enum BackupError {
    /// Device I/O failed
    #[error("Device error: {0}")]
    Remote(#[from] RemoteError),

    /// Local filesystem failure
    #[error("Local I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A core directory or file name cannot form a device path
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// Local save/state backups addressed by ROM content hash
#[derive(Debug, Clone)]
pub struct SaveBackupStore {
    root: PathBuf,
    client: RemoteStorageClient,
}

impl SaveBackupStore {
    pub fn new(root: impl Into<PathBuf>, client: RemoteStorageClient) -> Self {
        Self {
            root: root.into(),
            client,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the backup for `key`
    pub fn key_dir(&self, key: &ContentHash) -> PathBuf {
        self.root.join(key.as_str())
    }

    // ========================================================================
    // Backup
    // ========================================================================

    /// Copies the device's saves and states for one ROM into the store
    ///
    /// Only files in `saves/<core>/` and `states/<core>/` whose name starts
    /// with `base_name` are taken. Both local subtrees exist afterwards even
    /// when nothing matched; an empty result leaves an existing backup in
    /// place. Returns paths relative to the key directory,
    /// e.g. `saves/mario.srm`.
    pub async fn backup(
        &self,
        core: &str,
        base_name: &str,
        key: &ContentHash,
    ) -> Result<Vec<String>, BackupError> {
        let staging = self.root.join(format!("{STAGING_PREFIX}{key}"));
        if tokio::fs::try_exists(&staging).await? {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let result = self.download_into(&staging, core, base_name, key).await;
        let set = match result {
            Ok(set) => set,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&staging).await {
                    warn!(
                        path = %staging.display(),
                        error = %cleanup,
                        "Failed to remove staging directory"
                    );
                }
                return Err(e);
            }
        };

        let target = self.key_dir(key);
        if tokio::fs::try_exists(&target).await? {
            // An empty result never replaces an existing backup
            if set.is_empty() {
                tokio::fs::remove_dir_all(&staging).await?;
                info!(key = %key, core, "Nothing new to back up, keeping existing backup");
                return Ok(Vec::new());
            }
            tokio::fs::remove_dir_all(&target).await?;
        }
        tokio::fs::rename(&staging, &target).await?;

        info!(
            key = %key,
            core,
            saves = set.saves.len(),
            states = set.states.len(),
            "Backed up device saves"
        );
        Ok(set.relative_paths())
    }

    async fn download_into(
        &self,
        staging: &Path,
        core: &str,
        base_name: &str,
        key: &ContentHash,
    ) -> Result<BackupSet, BackupError> {
        let mut set = BackupSet::new(key.clone());

        for subtree in Subtree::ALL {
            let local_dir = staging.join(subtree.dir_name());
            tokio::fs::create_dir_all(&local_dir).await?;

            let remote_dir = remote_dir(subtree, core)?;
            let entries = match self.client.list_directory(&remote_dir).await {
                Ok(entries) => entries,
                Err(e) if e.is_not_found() => {
                    debug!(path = %remote_dir, "No device directory, nothing to back up");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            for entry in entries
                .iter()
                .filter(|e| e.is_visible_file() && e.name.starts_with(base_name))
            {
                let remote = remote_dir
                    .join(&entry.name)
                    .map_err(|e| BackupError::InvalidPath(e.to_string()))?;
                self.client
                    .download_file(&remote, &local_dir.join(&entry.name))
                    .await?;
                set.files_mut(subtree).push(entry.name.clone());
            }
            set.files_mut(subtree).sort();
        }

        Ok(set)
    }

    // ========================================================================
    // Restore
    // ========================================================================

    /// Uploads a stored backup back to `saves/<core>/` and `states/<core>/`
    ///
    /// A missing backup is an empty result, not an error. The remote
    /// directory of each non-empty subtree is created before its uploads.
    pub async fn restore(&self, core: &str, key: &ContentHash) -> Result<Vec<String>, BackupError> {
        let Some(set) = self.load(key).await? else {
            debug!(key = %key, "No backup to restore");
            return Ok(Vec::new());
        };

        let key_dir = self.key_dir(key);
        let mut restored = Vec::with_capacity(set.file_count());

        for subtree in Subtree::ALL {
            let files = set.files(subtree);
            if files.is_empty() {
                continue;
            }

            let remote_dir = remote_dir(subtree, core)?;
            self.client.create_directory(&remote_dir).await?;

            for name in files {
                let local = key_dir.join(subtree.dir_name()).join(name);
                self.client
                    .upload_file(&remote_dir, name, UploadBody::File(local))
                    .await?;
                restored.push(format!("{}/{}", subtree.dir_name(), name));
            }
        }

        info!(key = %key, core, files = restored.len(), "Restored saves to device");
        Ok(restored)
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Reads the backup for `key`
    ///
    /// Returns `None` when the key directory is missing or holds no files.
    pub async fn load(&self, key: &ContentHash) -> Result<Option<BackupSet>, BackupError> {
        let key_dir = self.key_dir(key);
        if !tokio::fs::try_exists(&key_dir).await? {
            return Ok(None);
        }

        let mut set = BackupSet::new(key.clone());
        for subtree in Subtree::ALL {
            *set.files_mut(subtree) = regular_files(&key_dir.join(subtree.dir_name())).await?;
        }

        Ok((!set.is_empty()).then_some(set))
    }

    /// Every non-empty backup in the store, ordered by key
    pub async fn list(&self) -> Result<Vec<BackupSet>, BackupError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            match ContentHash::new(&name) {
                Ok(key) => keys.push(key),
                Err(_) => debug!(name, "Ignoring non-backup directory"),
            }
        }
        keys.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(set) = self.load(&key).await? {
                sets.push(set);
            }
        }
        Ok(sets)
    }
}

fn remote_dir(subtree: Subtree, core: &str) -> Result<DevicePath, BackupError> {
    DevicePath::new(subtree.dir_name())
        .and_then(|d| d.join(core))
        .map_err(|e| BackupError::InvalidPath(e.to_string()))
}

/// Sorted names of the regular files directly inside `dir`
async fn regular_files(dir: &Path) -> Result<Vec<String>, BackupError> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrosync_device::testing::SimulatedDevice;
    use retrosync_device::{ClientOptions, MutationGate};
    use std::sync::Arc;
    use std::time::Duration;

    fn hash(s: &str) -> ContentHash {
        ContentHash::new(s).unwrap()
    }

    fn store_with(
        device: SimulatedDevice,
    ) -> (tempfile::TempDir, Arc<SimulatedDevice>, SaveBackupStore) {
        let device = Arc::new(device);
        let options = ClientOptions {
            list_retries: 0,
            retry_backoff: Duration::ZERO,
            throttle_downloads: false,
        };
        let client =
            RemoteStorageClient::with_gate(device.clone(), MutationGate::unthrottled(), options);
        let dir = tempfile::tempdir().unwrap();
        let store = SaveBackupStore::new(dir.path().join("backups"), client);
        (dir, device, store)
    }

    #[tokio::test]
    async fn test_backup_takes_prefixed_files_only() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        device.add_file("/saves/snes9x/zelda.srm", b"other".to_vec());
        device.add_file("/states/snes9x/mario.state1", b"state".to_vec());
        let (_dir, _device, store) = store_with(device);

        let files = store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        assert_eq!(files, vec!["saves/mario.srm", "states/mario.state1"]);
        let key_dir = store.key_dir(&hash("aaa"));
        assert_eq!(std::fs::read(key_dir.join("saves/mario.srm")).unwrap(), b"save");
        assert!(!key_dir.join("saves/zelda.srm").exists());
    }

    #[tokio::test]
    async fn test_backup_creates_both_subtrees_when_nothing_matches() {
        let (_dir, _device, store) = store_with(SimulatedDevice::with_standard_layout());

        let files = store.backup("mgba", "pokemon", &hash("bbb")).await.unwrap();

        assert!(files.is_empty());
        let key_dir = store.key_dir(&hash("bbb"));
        assert!(key_dir.join("saves").is_dir());
        assert!(key_dir.join("states").is_dir());
        assert!(store.load(&hash("bbb")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_backup_keeps_previous() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"v1".to_vec());
        let (_dir, device, store) = store_with(device);
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        device.make_unavailable("states/snes9x");
        let err = store.backup("snes9x", "mario", &hash("aaa")).await.unwrap_err();

        assert!(matches!(err, BackupError::Remote(_)));
        let set = store.load(&hash("aaa")).await.unwrap().unwrap();
        assert_eq!(set.saves, vec!["mario.srm"]);
        assert!(!store.root().join(".staging-aaa").exists());
    }

    #[tokio::test]
    async fn test_backup_replaces_stale_files() {
        let device = SimulatedDevice::with_standard_layout();
        device.set_prune_empty_dirs(false);
        device.add_file("/states/snes9x/mario.state1", b"old".to_vec());
        let (_dir, device, store) = store_with(device);
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        device.add_file("/saves/snes9x/mario.srm", b"new".to_vec());
        store
            .client
            .delete_file(&DevicePath::new("states/snes9x/mario.state1").unwrap())
            .await
            .unwrap();
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        let set = store.load(&hash("aaa")).await.unwrap().unwrap();
        assert_eq!(set.saves, vec!["mario.srm"]);
        assert!(set.states.is_empty());
    }

    #[tokio::test]
    async fn test_empty_backup_keeps_previous_set() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        let (_dir, _device, store) = store_with(device);
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        // Same store, but the device has lost its saves
        let (_dir2, _fresh, fresh_store) = store_with(SimulatedDevice::with_standard_layout());
        let rerun = SaveBackupStore::new(store.root().to_path_buf(), fresh_store.client.clone());
        let files = rerun.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        assert!(files.is_empty());
        let set = store.load(&hash("aaa")).await.unwrap().unwrap();
        assert_eq!(set.saves, vec!["mario.srm"]);
        assert_eq!(
            std::fs::read(store.key_dir(&hash("aaa")).join("saves/mario.srm")).unwrap(),
            b"save"
        );
        assert!(!store.root().join(".staging-aaa").exists());
    }

    #[tokio::test]
    async fn test_restore_missing_backup_is_noop() {
        let (_dir, device, store) = store_with(SimulatedDevice::with_standard_layout());

        let restored = store.restore("snes9x", &hash("none")).await.unwrap();

        assert!(restored.is_empty());
        assert_eq!(device.calls().total(), 0);
    }

    #[tokio::test]
    async fn test_restore_creates_core_directory_first() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        let (_dir, device, store) = store_with(device);
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();

        // Device lost the core directory (e.g. factory reset)
        let fresh = SimulatedDevice::with_standard_layout();
        let (_dir2, fresh, fresh_store) = store_with(fresh);
        let fresh_store =
            SaveBackupStore::new(store.root().to_path_buf(), fresh_store.client.clone());
        let restored = fresh_store.restore("snes9x", &hash("aaa")).await.unwrap();

        assert_eq!(restored, vec!["saves/mario.srm"]);
        assert!(fresh.has_dir("saves/snes9x"));
        assert!(!fresh.has_dir("states/snes9x"));
        assert_eq!(fresh.file_content("/saves/snes9x/mario.srm"), Some(b"save".to_vec()));
        assert_eq!(device.calls().upload, 0);
    }

    #[tokio::test]
    async fn test_list_skips_staging_and_empty_backups() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        let (_dir, _device, store) = store_with(device);
        store.backup("snes9x", "mario", &hash("aaa")).await.unwrap();
        store.backup("snes9x", "zelda", &hash("bbb")).await.unwrap();
        std::fs::create_dir_all(store.root().join(".staging-ccc/saves")).unwrap();

        let sets = store.list().await.unwrap();

        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].key, Some(hash("aaa")));
    }
}
