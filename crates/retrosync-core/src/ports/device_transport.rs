//! Device transport port (driven/secondary port)
//!
//! Raw access to the device's HTTP file API. Implementations do exactly one
//! request per call and map failures into [`RemoteError`]; idempotency,
//! pacing and the protected-path guard live in the storage client that
//! wraps the transport.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{classify_is_directory, DevicePath, RemoteEntry, RemoteError};

/// One entry exactly as returned by the device `list` endpoint
///
/// Every field except `name` is optional because firmware builds disagree
/// on which ones they send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<String>,
    #[serde(default, rename = "isDirectory", skip_serializing_if = "Option::is_none")]
    pub is_directory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl RawEntry {
    /// Classifies the entry and strips any trailing slash from its name
    pub fn classify(&self) -> RemoteEntry {
        let is_directory = classify_is_directory(
            self.is_directory,
            self.entry_type.as_deref(),
            self.path.as_deref(),
            &self.name,
        );
        RemoteEntry {
            name: self.name.trim_end_matches('/').to_string(),
            is_directory,
            source_subtree: None,
        }
    }
}

/// Payload of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBody {
    /// Read from a local file at send time
    File(PathBuf),
    /// In-memory content, e.g. a generated playlist
    Bytes(Vec<u8>),
}

/// Port trait for the device file API
#[async_trait::async_trait]
pub trait IDeviceTransport: Send + Sync {
    /// Base URL requests are sent to
    fn base_url(&self) -> String;

    /// `GET /list?path=/dir/`
    async fn list(&self, dir: &DevicePath) -> Result<Vec<RawEntry>, RemoteError>;

    /// `POST /create` with form field `path=/dir/`
    async fn create(&self, dir: &DevicePath) -> Result<(), RemoteError>;

    /// `POST /delete` with form field `path=/dir/file`
    async fn delete(&self, path: &DevicePath) -> Result<(), RemoteError>;

    /// `POST /upload` multipart with the file part and `path=dir/`
    async fn upload(
        &self,
        dir: &DevicePath,
        file_name: &str,
        body: UploadBody,
    ) -> Result<(), RemoteError>;

    /// `GET /download?path=/dir/file`, written to `dest`; returns bytes written
    async fn download(&self, path: &DevicePath, dest: &Path) -> Result<u64, RemoteError>;

    /// Cheap reachability check
    async fn probe(&self) -> Result<(), RemoteError>;
}
