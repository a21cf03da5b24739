//! RemoteStorageClient - defensive wrapper around the device file API
//!
//! All device mutation in RetroSync goes through this client. It shields
//! callers from the device's quirks:
//!
//! - re-creating an existing directory makes a numbered duplicate
//!   (`downloads (1)`), so [`RemoteStorageClient::create_directory`] lists
//!   first and only creates after a confirmed `NotFound`;
//! - deleting the last file of a directory can delete the directory too, so
//!   [`RemoteStorageClient::clear_directory`] always recreates and verifies
//!   the directory it emptied;
//! - the web server drops requests when flooded, so every mutation is paced
//!   by a [`MutationGate`];
//! - top-level directories must never be deleted, so
//!   [`RemoteStorageClient::delete_file`] refuses them before any request.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use retrosync_core::config::{DeviceAddress, DeviceConfig};
use retrosync_core::domain::{DevicePath, RemoteEntry, RemoteError};
use retrosync_core::ports::{IDeviceTransport, UploadBody};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::rate_limit::MutationGate;
use crate::transport::HttpDeviceTransport;

// ============================================================================
// Protected and critical paths
// ============================================================================

/// Top-level directories that [`RemoteStorageClient::delete_file`] refuses,
/// in normalized form (`""` is the root)
pub const PROTECTED_PATHS: [&str; 7] = [
    "",
    "downloads",
    "playlists",
    "saves",
    "states",
    "config",
    "system",
];

/// Returns true if deleting `path` is forbidden
pub fn is_protected(path: &DevicePath) -> bool {
    PROTECTED_PATHS.contains(&path.as_str())
}

/// Directories that must exist before ROMs and saves are pushed
pub fn critical_directories() -> [DevicePath; 4] {
    [
        DevicePath::downloads(),
        DevicePath::playlists(),
        DevicePath::saves(),
        DevicePath::states(),
    ]
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of an idempotent directory create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Result of emptying one device directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearOutcome {
    /// Names of files removed
    pub deleted: Vec<String>,
    /// `(name, error)` for files that could not be removed
    pub failed: Vec<(String, String)>,
    /// Hidden entries and subdirectories left in place
    pub skipped: Vec<String>,
    /// The directory was missing after the clear and had to be created
    pub recreated: bool,
    /// Set when the directory could not be confirmed present afterwards
    pub repair_error: Option<String>,
    /// Cancellation stopped the clear before every file was visited
    pub interrupted: bool,
}

impl ClearOutcome {
    /// True when every file was deleted and the directory is confirmed
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.repair_error.is_none() && !self.interrupted
    }
}

/// Result of a reachability check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub online: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Options
// ============================================================================

/// Retry and pacing behaviour of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Extra attempts for listings that fail with `Unavailable`
    pub list_retries: u32,
    /// Base delay between listing attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Pace downloads through the mutation gate
    pub throttle_downloads: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for ClientOptions {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            list_retries: config.list_retries,
            retry_backoff: config.retry_backoff(),
            throttle_downloads: config.throttle_downloads,
        }
    }
}

// ============================================================================
// RemoteStorageClient
// ============================================================================

/// Rate-limited, quirk-aware operations against the device file tree
#[derive(Clone)]
pub struct RemoteStorageClient {
    transport: Arc<dyn IDeviceTransport>,
    gate: MutationGate,
    options: ClientOptions,
}

impl std::fmt::Debug for RemoteStorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStorageClient")
            .field("base_url", &self.transport.base_url())
            .field("gate", &self.gate)
            .field("options", &self.options)
            .finish()
    }
}

impl RemoteStorageClient {
    /// Creates a client over any transport, paced per `config`
    pub fn new(transport: Arc<dyn IDeviceTransport>, config: &DeviceConfig) -> Self {
        Self::with_gate(
            transport,
            MutationGate::new(config.mutation_interval()),
            ClientOptions::from(config),
        )
    }

    /// Creates a client with an explicit gate and options (useful for testing)
    pub fn with_gate(
        transport: Arc<dyn IDeviceTransport>,
        gate: MutationGate,
        options: ClientOptions,
    ) -> Self {
        Self {
            transport,
            gate,
            options,
        }
    }

    /// Creates an HTTP client for a resolved device address
    pub fn for_address(address: &DeviceAddress, config: &DeviceConfig) -> Self {
        let transport = HttpDeviceTransport::new(address, config);
        Self::new(Arc::new(transport), config)
    }

    pub fn base_url(&self) -> String {
        self.transport.base_url()
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Lists a directory, retrying transient failures
    ///
    /// `Unavailable` is retried up to `list_retries` times with linear
    /// backoff. `NotFound` is returned immediately: callers treat it as
    /// "directory needs creation".
    pub async fn list_directory(&self, dir: &DevicePath) -> Result<Vec<RemoteEntry>, RemoteError> {
        let mut attempt = 0u32;
        loop {
            match self.transport.list(dir).await {
                Ok(raw) => {
                    let entries: Vec<RemoteEntry> = raw
                        .iter()
                        .map(|e| e.classify())
                        .filter(|e| !e.name.is_empty() && e.name != "." && e.name != "..")
                        .collect();
                    debug!(path = %dir, count = entries.len(), "Listed directory");
                    return Ok(entries);
                }
                Err(e) if e.is_retryable() && attempt < self.options.list_retries => {
                    attempt += 1;
                    let backoff = self.options.retry_backoff * attempt;
                    warn!(
                        path = %dir,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Listing failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Downloads a file to `dest`, returning the bytes written
    pub async fn download_file(&self, path: &DevicePath, dest: &Path) -> Result<u64, RemoteError> {
        let _permit = if self.options.throttle_downloads {
            Some(self.gate.acquire("download").await)
        } else {
            None
        };
        let written = self.transport.download(path, dest).await?;
        debug!(path = %path, bytes = written, "Downloaded file");
        Ok(written)
    }

    /// Probes the device and reports whether it answered
    pub async fn check_connection(&self) -> ConnectionStatus {
        let url = self.transport.base_url();
        match self.transport.probe().await {
            Ok(()) => ConnectionStatus {
                online: true,
                url,
                error: None,
            },
            Err(e) => {
                debug!(url = %url, error = %e, "Device probe failed");
                ConnectionStatus {
                    online: false,
                    url,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Creates a directory unless it already exists
    ///
    /// The device create endpoint is only called after the listing returned
    /// `NotFound`. An `Unavailable` listing is returned as an error instead
    /// of risking a duplicate directory.
    pub async fn create_directory(&self, dir: &DevicePath) -> Result<CreateOutcome, RemoteError> {
        match self.list_directory(dir).await {
            Ok(_) => {
                debug!(path = %dir, "Directory already exists");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) if e.is_not_found() => {
                let _permit = self.gate.acquire("create").await;
                self.transport.create(dir).await?;
                info!(path = %dir, "Created directory");
                Ok(CreateOutcome::Created)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes a single file
    ///
    /// Protected top-level directories are refused with
    /// [`RemoteError::ProtectedPath`] before any request is made.
    pub async fn delete_file(&self, path: &DevicePath) -> Result<(), RemoteError> {
        if is_protected(path) {
            error!(path = %path, "Refusing to delete protected device path");
            return Err(RemoteError::ProtectedPath(path.dir_query()));
        }

        let _permit = self.gate.acquire("delete").await;
        self.transport.delete(path).await?;
        debug!(path = %path, "Deleted file");
        Ok(())
    }

    /// Uploads a file into `dir` under `file_name`
    pub async fn upload_file(
        &self,
        dir: &DevicePath,
        file_name: &str,
        body: UploadBody,
    ) -> Result<(), RemoteError> {
        // Validates the name as a single path component
        dir.join(file_name).map_err(|e| {
            RemoteError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                e.to_string(),
            ))
        })?;

        let _permit = self.gate.acquire("upload").await;
        self.transport.upload(dir, file_name, body).await?;
        debug!(dir = %dir, file = file_name, "Uploaded file");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Composite operations
    // ------------------------------------------------------------------------

    /// Re-asserts that downloads, playlists, saves and states exist
    pub async fn ensure_critical_directories(
        &self,
    ) -> Vec<(DevicePath, Result<CreateOutcome, RemoteError>)> {
        let mut results = Vec::with_capacity(4);
        for dir in critical_directories() {
            let outcome = self.create_directory(&dir).await;
            if let Err(e) = &outcome {
                warn!(path = %dir, error = %e, "Could not ensure critical directory");
            }
            results.push((dir, outcome));
        }
        results
    }

    /// Deletes every visible file in `dir`, then recreates and verifies it
    ///
    /// Subdirectories and hidden entries are skipped. The recreate step
    /// runs whatever happened before it, including cancellation and a
    /// failed listing. A listing that fails with anything other than
    /// `NotFound` is still returned as an error, after the repair attempt.
    pub async fn clear_directory(
        &self,
        dir: &DevicePath,
        cancel: &CancellationToken,
    ) -> Result<ClearOutcome, RemoteError> {
        let mut outcome = ClearOutcome::default();

        let listing = match self.list_directory(dir).await {
            Ok(entries) => Some(entries),
            Err(e) if e.is_not_found() => {
                info!(path = %dir, "Directory missing before clear");
                None
            }
            Err(e) => {
                self.repair_directory(dir, &mut outcome).await;
                return Err(e);
            }
        };

        for entry in listing.into_iter().flatten() {
            if cancel.is_cancelled() {
                warn!(path = %dir, "Clear interrupted by cancellation");
                outcome.interrupted = true;
                break;
            }
            if entry.is_hidden() || entry.is_directory {
                debug!(path = %dir, name = %entry.name, "Skipping entry");
                outcome.skipped.push(entry.name);
                continue;
            }

            let path = match dir.join(&entry.name) {
                Ok(path) => path,
                Err(e) => {
                    outcome.failed.push((entry.name, e.to_string()));
                    continue;
                }
            };

            match self.delete_file(&path).await {
                Ok(()) => {
                    info!(path = %path, "Deleted");
                    outcome.deleted.push(entry.name);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Delete failed");
                    outcome.failed.push((entry.name, e.to_string()));
                }
            }
        }

        self.repair_directory(dir, &mut outcome).await;
        Ok(outcome)
    }

    /// Recreate `dir` if the device removed it, then confirm with a listing
    async fn repair_directory(&self, dir: &DevicePath, outcome: &mut ClearOutcome) {
        match self.create_directory(dir).await {
            Ok(created) => {
                outcome.recreated = created == CreateOutcome::Created;
                if let Err(e) = self.list_directory(dir).await {
                    error!(path = %dir, error = %e, "Directory missing after repair");
                    outcome.repair_error = Some(e.to_string());
                }
            }
            Err(e) => {
                error!(path = %dir, error = %e, "Could not recreate directory");
                outcome.repair_error = Some(e.to_string());
            }
        }
    }
}
