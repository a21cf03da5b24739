//! Status command - Device reachability and current content
//!
//! Provides the `retrosync status` CLI command which probes the device and,
//! when it answers, lists what is in `downloads/` and `playlists/`.

use anyhow::Result;
use clap::Args;
use retrosync_core::domain::DevicePath;
use retrosync_device::RemoteStorageClient;

use super::CliContext;

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Also list file names
    #[arg(long)]
    pub files: bool,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let catalog = ctx.open_catalog().await?;
        let client = ctx.client(&catalog).await?;

        let status = client.check_connection().await;
        if !status.online {
            if ctx.is_json() {
                formatter.print_json(&serde_json::to_value(&status)?);
            } else {
                formatter.error(&format!(
                    "Device at {} is offline: {}",
                    status.url,
                    status.error.as_deref().unwrap_or("no response")
                ));
            }
            return Ok(());
        }

        let downloads = visible_files(&client, &DevicePath::downloads()).await;
        let playlists = visible_files(&client, &DevicePath::playlists()).await;

        if ctx.is_json() {
            let json = serde_json::json!({
                "online": true,
                "url": status.url,
                "downloads": listing_json(&downloads),
                "playlists": listing_json(&playlists),
            });
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Device online at {}", status.url));
        for (label, listing) in [("ROMs", &downloads), ("Playlists", &playlists)] {
            match listing {
                Ok(names) => {
                    formatter.field(label, &names.len().to_string());
                    if self.files {
                        for name in names {
                            formatter.info(&format!("  {name}"));
                        }
                    }
                }
                Err(e) => formatter.warn(&format!("{label}: {e}")),
            }
        }
        Ok(())
    }
}

fn listing_json(listing: &Result<Vec<String>, String>) -> serde_json::Value {
    match listing {
        Ok(names) => serde_json::json!(names),
        Err(e) => serde_json::json!({ "error": e }),
    }
}

/// Visible file names in `dir`; a missing directory is empty
async fn visible_files(
    client: &RemoteStorageClient,
    dir: &DevicePath,
) -> Result<Vec<String>, String> {
    match client.list_directory(dir).await {
        Ok(entries) => Ok(entries
            .into_iter()
            .filter(|e| e.is_visible_file())
            .map(|e| e.name)
            .collect()),
        Err(e) if e.is_not_found() => Ok(Vec::new()),
        Err(e) => Err(e.to_string()),
    }
}
