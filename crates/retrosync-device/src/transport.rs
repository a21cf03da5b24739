//! HTTP transport for the RetroArch WebUI file API
//!
//! One request per call, no retries and no pacing; those belong to
//! [`RemoteStorageClient`](crate::client::RemoteStorageClient).
//!
//! ## Endpoints
//!
//! | Call | Request |
//! |---|---|
//! | list | `GET /list?path=/dir/` |
//! | create | `POST /create`, form `path=/dir/` |
//! | delete | `POST /delete`, form `path=/dir/file` |
//! | upload | `POST /upload`, multipart `files[]` + `path=dir/` |
//! | download | `GET /download?path=/dir/file` |
//!
//! ## Status mapping
//!
//! - 404 -> [`RemoteError::NotFound`]
//! - connection failure, timeout, 5xx -> [`RemoteError::Unavailable`]
//! - any other non-2xx -> [`RemoteError::Rejected`]

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{multipart, Body, Client, RequestBuilder, Response, StatusCode};
use retrosync_core::config::{DeviceAddress, DeviceConfig};
use retrosync_core::domain::{DevicePath, RemoteError};
use retrosync_core::ports::{IDeviceTransport, RawEntry, UploadBody};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

/// Timeout for the connectivity probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest response body kept in a `Rejected` error
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Timeouts
// ============================================================================

/// Per-endpoint request timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    pub list: Duration,
    /// `create` and `delete`
    pub mutation: Duration,
    pub upload: Duration,
    pub download: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self::from(&DeviceConfig::default())
    }
}

impl From<&DeviceConfig> for TransportTimeouts {
    fn from(config: &DeviceConfig) -> Self {
        Self {
            list: config.list_timeout(),
            mutation: config.mutation_timeout(),
            upload: config.upload_timeout(),
            download: config.download_timeout(),
        }
    }
}

// ============================================================================
// HttpDeviceTransport
// ============================================================================

/// reqwest-backed [`IDeviceTransport`]
#[derive(Debug, Clone)]
pub struct HttpDeviceTransport {
    client: Client,
    base_url: String,
    timeouts: TransportTimeouts,
}

impl HttpDeviceTransport {
    /// Creates a transport for a resolved device address
    pub fn new(address: &DeviceAddress, config: &DeviceConfig) -> Self {
        Self::with_base_url(address.base_url(), TransportTimeouts::from(config))
    }

    /// Creates a transport with a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>, timeouts: TransportTimeouts) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            timeouts,
        }
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        self.client.get(format!("{}/{endpoint}", self.base_url))
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        self.client.post(format!("{}/{endpoint}", self.base_url))
    }

    async fn send(&self, request: RequestBuilder, target: &str) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(e, target))?;
        check_status(response, target).await
    }

    async fn upload_part(
        &self,
        file_name: &str,
        body: UploadBody,
    ) -> Result<multipart::Part, RemoteError> {
        let part = match body {
            UploadBody::Bytes(bytes) => multipart::Part::bytes(bytes),
            UploadBody::File(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let len = file.metadata().await?.len();
                let stream = ReaderStream::new(file);
                multipart::Part::stream_with_length(Body::wrap_stream(stream), len)
            }
        };
        part.file_name(file_name.to_string())
            .mime_str("application/octet-stream")
            .map_err(|e| RemoteError::InvalidResponse(format!("Invalid upload part: {e}")))
    }
}

#[async_trait::async_trait]
impl IDeviceTransport for HttpDeviceTransport {
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    async fn list(&self, dir: &DevicePath) -> Result<Vec<RawEntry>, RemoteError> {
        let query = dir.dir_query();
        debug!(path = %query, "GET /list");

        let request = self
            .get("list")
            .query(&[("path", query.as_str())])
            .timeout(self.timeouts.list);
        let response = self.send(request, &query).await?;

        let text = response
            .text()
            .await
            .map_err(|e| map_send_error(e, &query))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| {
            RemoteError::InvalidResponse(format!("Listing of {query} is not a JSON array: {e}"))
        })
    }

    async fn create(&self, dir: &DevicePath) -> Result<(), RemoteError> {
        let query = dir.dir_query();
        debug!(path = %query, "POST /create");

        let request = self
            .post("create")
            .form(&[("path", query.as_str())])
            .timeout(self.timeouts.mutation);
        self.send(request, &query).await?;
        Ok(())
    }

    async fn delete(&self, path: &DevicePath) -> Result<(), RemoteError> {
        let query = path.file_query();
        debug!(path = %query, "POST /delete");

        let request = self
            .post("delete")
            .form(&[("path", query.as_str())])
            .timeout(self.timeouts.mutation);
        self.send(request, &query).await?;
        Ok(())
    }

    async fn upload(
        &self,
        dir: &DevicePath,
        file_name: &str,
        body: UploadBody,
    ) -> Result<(), RemoteError> {
        let target = dir.upload_target();
        debug!(dir = %target, file = file_name, "POST /upload");

        let form = multipart::Form::new()
            .part("files[]", self.upload_part(file_name, body).await?)
            .text("path", target.clone());
        let request = self
            .post("upload")
            .multipart(form)
            .timeout(self.timeouts.upload);

        self.send(request, &format!("{target}{file_name}")).await?;
        Ok(())
    }

    async fn download(&self, path: &DevicePath, dest: &Path) -> Result<u64, RemoteError> {
        let query = path.file_query();
        debug!(path = %query, dest = %dest.display(), "GET /download");

        let request = self
            .get("download")
            .query(&[("path", query.as_str())])
            .timeout(self.timeouts.download);
        let response = self.send(request, &query).await?;

        let partial = partial_path(dest);
        match write_stream(response, &partial, &query).await {
            Ok(written) => {
                tokio::fs::rename(&partial, dest).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    warn!(
                        path = %partial.display(),
                        error = %cleanup,
                        "Failed to remove partial download"
                    );
                }
                Err(e)
            }
        }
    }

    async fn probe(&self) -> Result<(), RemoteError> {
        let request = self.client.get(&self.base_url).timeout(PROBE_TIMEOUT);
        self.send(request, "/").await?;
        Ok(())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Sibling temp file a download is streamed into before the rename
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_stream(
    response: Response,
    partial: &Path,
    target: &str,
) -> Result<u64, RemoteError> {
    if let Some(parent) = partial.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut file = tokio::fs::File::create(partial).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| map_send_error(e, target))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Every transport-level failure is retryable from the caller's view
fn map_send_error(error: reqwest::Error, target: &str) -> RemoteError {
    let kind = if error.is_timeout() {
        "timed out"
    } else if error.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    RemoteError::Unavailable(format!("{target}: {kind}: {error}"))
}

async fn check_status(response: Response, target: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::NotFound(target.to_string()));
    }
    if status.is_server_error() {
        return Err(RemoteError::Unavailable(format!("{target}: HTTP {status}")));
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(RemoteError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_sibling() {
        let dest = Path::new("/tmp/backups/aaa/saves/mario.srm");
        assert_eq!(
            partial_path(dest),
            PathBuf::from("/tmp/backups/aaa/saves/mario.srm.part")
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let transport =
            HttpDeviceTransport::with_base_url("http://10.0.0.2:80/", TransportTimeouts::default());
        assert_eq!(transport.base_url(), "http://10.0.0.2:80");
    }

    #[test]
    fn test_timeouts_from_config() {
        let timeouts = TransportTimeouts::from(&DeviceConfig::default());
        assert_eq!(timeouts.list, Duration::from_secs(10));
        assert_eq!(timeouts.upload, Duration::from_secs(120));
        assert_eq!(timeouts.download, Duration::from_secs(60));
    }
}
