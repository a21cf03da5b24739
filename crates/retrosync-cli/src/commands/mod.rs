//! CLI subcommands and the wiring they share

pub mod backups;
pub mod catalog;
pub mod config;
pub mod push;
pub mod status;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use retrosync_cache::{DatabasePool, SqliteCatalog};
use retrosync_core::config::{Config, DeviceAddress, SETTING_DEVICE_HOST, SETTING_DEVICE_PORT};
use retrosync_device::RemoteStorageClient;
use retrosync_sync::{RetroArchPlaylists, SaveBackupStore, SyncOrchestrator};
use tracing::info;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Global options and loaded configuration for one invocation
pub struct CliContext {
    pub format: OutputFormat,
    pub config_path: PathBuf,
    pub config: Config,
}

impl CliContext {
    pub fn new(format: OutputFormat, config_path: PathBuf, config: Config) -> Self {
        Self {
            format,
            config_path,
            config,
        }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Opens the catalog database named in the config
    pub async fn open_catalog(&self) -> Result<SqliteCatalog> {
        let path = &self.config.storage.database;
        let pool = DatabasePool::new(path)
            .await
            .with_context(|| format!("Failed to open catalog at {}", path.display()))?;
        Ok(SqliteCatalog::new(pool.pool().clone()))
    }

    /// Device address from the persisted settings, falling back to config
    pub async fn device_address(&self, catalog: &SqliteCatalog) -> Result<DeviceAddress> {
        let host = catalog
            .get_setting(SETTING_DEVICE_HOST)
            .await
            .context("Failed to read device host setting")?;
        let port = catalog
            .get_setting(SETTING_DEVICE_PORT)
            .await
            .context("Failed to read device port setting")?;

        let address = DeviceAddress::resolve(host.as_deref(), port.as_deref(), &self.config.device);
        info!(address = %address, "Resolved device address");
        Ok(address)
    }

    /// Client for the resolved device address
    pub async fn client(&self, catalog: &SqliteCatalog) -> Result<RemoteStorageClient> {
        let address = self.device_address(catalog).await?;
        Ok(RemoteStorageClient::for_address(&address, &self.config.device))
    }

    /// Orchestrator wired to the catalog, device and backup store
    pub async fn orchestrator(&self) -> Result<SyncOrchestrator> {
        let catalog = self.open_catalog().await?;
        let client = self.client(&catalog).await?;
        let backups = SaveBackupStore::new(self.config.storage.backup_root.clone(), client.clone());

        Ok(SyncOrchestrator::new(
            Arc::new(catalog),
            client,
            backups,
            Arc::new(RetroArchPlaylists::new()),
        ))
    }
}
