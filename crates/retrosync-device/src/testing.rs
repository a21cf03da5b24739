//! In-memory simulated device
//!
//! [`SimulatedDevice`] implements [`IDeviceTransport`] over an in-memory
//! file tree and reproduces the device behaviour the client has to defend
//! against:
//!
//! - `create` on an existing directory makes `name (1)`, `name (2)`, ...
//! - deleting the last entry of a directory removes the directory
//! - uploads into a missing directory fail with 404
//! - the whole device, or single paths, can be made unreachable
//!
//! Every call is counted so tests can assert on network traffic.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use retrosync_core::domain::{DevicePath, RemoteError};
use retrosync_core::ports::{IDeviceTransport, RawEntry, UploadBody};
use tokio_util::sync::CancellationToken;

/// Per-endpoint call counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub create: usize,
    pub delete: usize,
    pub upload: usize,
    pub download: usize,
    pub probe: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list + self.create + self.delete + self.upload + self.download + self.probe
    }

    /// Calls that change device state
    pub fn mutations(&self) -> usize {
        self.create + self.delete + self.upload
    }
}

#[derive(Debug)]
struct State {
    dirs: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    reachable: bool,
    prune_empty_dirs: bool,
    unavailable_paths: HashSet<String>,
    rejected_uploads: HashSet<String>,
    calls: CallCounts,
}

/// In-memory stand-in for the device file API
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<State>,
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn leaf_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

impl State {
    fn has_children(&self, dir: &str) -> bool {
        self.dirs.iter().any(|d| !d.is_empty() && parent_of(d) == dir)
            || self.files.keys().any(|f| parent_of(f) == dir)
    }

    fn insert_dir_with_parents(&mut self, dir: &str) {
        let mut current = String::new();
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            current = join(&current, segment);
            self.dirs.insert(current.clone());
        }
    }

    fn check_reachable(&self, path: &str) -> Result<(), RemoteError> {
        if !self.reachable {
            return Err(RemoteError::Unavailable("device unreachable".to_string()));
        }
        if self.unavailable_paths.contains(path) {
            return Err(RemoteError::Unavailable(format!("/{path}: timed out")));
        }
        Ok(())
    }

    /// Removes `dir` and its emptied ancestors, mirroring the device
    fn prune_from(&mut self, mut dir: String) {
        while self.prune_empty_dirs && !dir.is_empty() && !self.has_children(&dir) {
            self.dirs.remove(&dir);
            dir = parent_of(&dir);
        }
    }
}

impl SimulatedDevice {
    /// An empty, reachable device with only the root directory
    pub fn new() -> Self {
        let mut dirs = BTreeSet::new();
        dirs.insert(String::new());
        Self {
            state: Mutex::new(State {
                dirs,
                files: BTreeMap::new(),
                reachable: true,
                prune_empty_dirs: true,
                unavailable_paths: HashSet::new(),
                rejected_uploads: HashSet::new(),
                calls: CallCounts::default(),
            }),
        }
    }

    /// A device with downloads, playlists, saves and states present
    pub fn with_standard_layout() -> Self {
        let device = Self::new();
        for dir in ["downloads", "playlists", "saves", "states"] {
            device.add_dir(dir);
        }
        device
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Fixture setup
    // ------------------------------------------------------------------------

    /// Creates a directory and its parents
    pub fn add_dir(&self, dir: &str) {
        self.state().insert_dir_with_parents(&normalize(dir));
    }

    /// Creates a file, creating its parent directories
    pub fn add_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        let path = normalize(path);
        let mut state = self.state();
        state.insert_dir_with_parents(&parent_of(&path));
        state.files.insert(path, content.into());
    }

    /// Simulates the device going offline or coming back
    pub fn set_reachable(&self, reachable: bool) {
        self.state().reachable = reachable;
    }

    /// Makes every call touching exactly `path` fail with `Unavailable`
    pub fn make_unavailable(&self, path: &str) {
        self.state().unavailable_paths.insert(normalize(path));
    }

    /// Makes uploads of files named `file_name` fail with a 400
    pub fn reject_uploads_of(&self, file_name: &str) {
        self.state().rejected_uploads.insert(file_name.to_string());
    }

    /// Toggles the delete-last-file-removes-directory behaviour
    pub fn set_prune_empty_dirs(&self, prune: bool) {
        self.state().prune_empty_dirs = prune;
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn has_dir(&self, dir: &str) -> bool {
        self.state().dirs.contains(&normalize(dir))
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state().files.contains_key(&normalize(path))
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        self.state().files.get(&normalize(path)).cloned()
    }

    /// Names of the files directly inside `dir`, sorted
    pub fn files_in(&self, dir: &str) -> Vec<String> {
        let dir = normalize(dir);
        self.state()
            .files
            .keys()
            .filter(|f| parent_of(f) == dir)
            .map(|f| leaf_of(f).to_string())
            .collect()
    }

    /// Names of the directories directly inside `dir`, sorted
    pub fn dirs_in(&self, dir: &str) -> Vec<String> {
        let dir = normalize(dir);
        self.state()
            .dirs
            .iter()
            .filter(|d| !d.is_empty() && parent_of(d) == dir)
            .map(|d| leaf_of(d).to_string())
            .collect()
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn reset_calls(&self) {
        self.state().calls = CallCounts::default();
    }
}

#[async_trait::async_trait]
impl IDeviceTransport for SimulatedDevice {
    fn base_url(&self) -> String {
        "sim://device".to_string()
    }

    async fn list(&self, dir: &DevicePath) -> Result<Vec<RawEntry>, RemoteError> {
        let mut state = self.state();
        state.calls.list += 1;
        let dir = dir.as_str().to_string();
        state.check_reachable(&dir)?;

        if !state.dirs.contains(&dir) {
            return Err(RemoteError::NotFound(format!("/{dir}/")));
        }

        let mut entries = Vec::new();
        for sub in state.dirs.iter().filter(|d| !d.is_empty() && parent_of(d) == dir) {
            entries.push(RawEntry {
                name: leaf_of(sub).to_string(),
                path: Some(format!("/{sub}/")),
                ..RawEntry::default()
            });
        }
        for (path, content) in state.files.iter().filter(|(f, _)| parent_of(f) == dir) {
            entries.push(RawEntry {
                name: leaf_of(path).to_string(),
                path: Some(format!("/{path}")),
                entry_type: Some("file".to_string()),
                size: Some(content.len() as u64),
                ..RawEntry::default()
            });
        }
        Ok(entries)
    }

    async fn create(&self, dir: &DevicePath) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.create += 1;
        let dir = dir.as_str().to_string();
        state.check_reachable(&dir)?;

        if !state.dirs.contains(&dir) {
            state.insert_dir_with_parents(&dir);
            return Ok(());
        }

        let mut n = 1;
        loop {
            let candidate = format!("{dir} ({n})");
            if !state.dirs.contains(&candidate) {
                state.dirs.insert(candidate);
                return Ok(());
            }
            n += 1;
        }
    }

    async fn delete(&self, path: &DevicePath) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.delete += 1;
        let path = path.as_str().to_string();
        state.check_reachable(&path)?;

        if state.files.remove(&path).is_some() {
            state.prune_from(parent_of(&path));
            return Ok(());
        }
        if !path.is_empty() && state.dirs.contains(&path) {
            if state.has_children(&path) {
                return Err(RemoteError::Rejected {
                    status: 400,
                    body: "directory not empty".to_string(),
                });
            }
            state.dirs.remove(&path);
            state.prune_from(parent_of(&path));
            return Ok(());
        }
        Err(RemoteError::NotFound(format!("/{path}")))
    }

    async fn upload(
        &self,
        dir: &DevicePath,
        file_name: &str,
        body: UploadBody,
    ) -> Result<(), RemoteError> {
        let content = match body {
            UploadBody::Bytes(bytes) => bytes,
            UploadBody::File(path) => tokio::fs::read(&path).await?,
        };

        let mut state = self.state();
        state.calls.upload += 1;
        let dir = dir.as_str().to_string();
        state.check_reachable(&dir)?;

        if state.rejected_uploads.contains(file_name) {
            return Err(RemoteError::Rejected {
                status: 400,
                body: format!("upload of {file_name} rejected"),
            });
        }
        if !state.dirs.contains(&dir) {
            return Err(RemoteError::NotFound(format!("/{dir}/")));
        }
        state.files.insert(join(&dir, file_name), content);
        Ok(())
    }

    async fn download(&self, path: &DevicePath, dest: &Path) -> Result<u64, RemoteError> {
        let content = {
            let mut state = self.state();
            state.calls.download += 1;
            let path = path.as_str().to_string();
            state.check_reachable(&path)?;
            state
                .files
                .get(&path)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(format!("/{path}")))?
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &content).await?;
        Ok(content.len() as u64)
    }

    async fn probe(&self) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.calls.probe += 1;
        state.check_reachable("")
    }
}

// ============================================================================
// CancelOnDelete
// ============================================================================

/// Forwards to a [`SimulatedDevice`] and cancels `token` once a delete
/// has gone through
///
/// Lets tests cancel a run in the middle of a clear, after the device has
/// already lost files.
pub struct CancelOnDelete {
    inner: Arc<SimulatedDevice>,
    token: CancellationToken,
}

impl CancelOnDelete {
    pub fn new(inner: Arc<SimulatedDevice>, token: CancellationToken) -> Self {
        Self { inner, token }
    }
}

#[async_trait::async_trait]
impl IDeviceTransport for CancelOnDelete {
    fn base_url(&self) -> String {
        self.inner.base_url()
    }

    async fn list(&self, dir: &DevicePath) -> Result<Vec<RawEntry>, RemoteError> {
        self.inner.list(dir).await
    }

    async fn create(&self, dir: &DevicePath) -> Result<(), RemoteError> {
        self.inner.create(dir).await
    }

    async fn delete(&self, path: &DevicePath) -> Result<(), RemoteError> {
        let result = self.inner.delete(path).await;
        if result.is_ok() {
            self.token.cancel();
        }
        result
    }

    async fn upload(
        &self,
        dir: &DevicePath,
        file_name: &str,
        body: UploadBody,
    ) -> Result<(), RemoteError> {
        self.inner.upload(dir, file_name, body).await
    }

    async fn download(&self, path: &DevicePath, dest: &Path) -> Result<u64, RemoteError> {
        self.inner.download(path, dest).await
    }

    async fn probe(&self) -> Result<(), RemoteError> {
        self.inner.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> DevicePath {
        DevicePath::new(p).unwrap()
    }

    #[tokio::test]
    async fn test_create_existing_dir_makes_duplicate() {
        let device = SimulatedDevice::with_standard_layout();
        device.create(&path("downloads")).await.unwrap();
        assert!(device.has_dir("downloads (1)"));
        device.create(&path("downloads")).await.unwrap();
        assert!(device.has_dir("downloads (2)"));
    }

    #[tokio::test]
    async fn test_delete_last_file_removes_directory() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/downloads/mario.sfc", b"rom".to_vec());
        device.delete(&path("downloads/mario.sfc")).await.unwrap();
        assert!(!device.has_dir("downloads"));
        assert!(device.has_dir("saves"));
    }

    #[tokio::test]
    async fn test_pruning_can_be_disabled() {
        let device = SimulatedDevice::with_standard_layout();
        device.set_prune_empty_dirs(false);
        device.add_file("/downloads/mario.sfc", b"rom".to_vec());
        device.delete(&path("downloads/mario.sfc")).await.unwrap();
        assert!(device.has_dir("downloads"));
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_not_found() {
        let device = SimulatedDevice::new();
        let err = device.list(&path("saves/snes9x")).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(device.calls().list, 1);
    }

    #[tokio::test]
    async fn test_upload_into_missing_dir_fails() {
        let device = SimulatedDevice::new();
        let err = device
            .upload(&path("saves/snes9x"), "mario.srm", UploadBody::Bytes(vec![1]))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unreachable_device() {
        let device = SimulatedDevice::with_standard_layout();
        device.set_reachable(false);
        assert!(device.list(&path("downloads")).await.unwrap_err().is_retryable());
        assert!(device.probe().await.is_err());
        assert_eq!(device.calls().total(), 2);
    }

    #[tokio::test]
    async fn test_listing_classifies_entries() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        let entries: Vec<_> = device
            .list(&path("saves"))
            .await
            .unwrap()
            .iter()
            .map(RawEntry::classify)
            .collect();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_directory);
        assert_eq!(entries[0].name, "snes9x");
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let device = SimulatedDevice::with_standard_layout();
        device.add_file("/saves/snes9x/mario.srm", b"save".to_vec());
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("mario.srm");

        let written = device
            .download(&path("saves/snes9x/mario.srm"), &dest)
            .await
            .unwrap();
        assert_eq!(written, 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"save");
    }
}
