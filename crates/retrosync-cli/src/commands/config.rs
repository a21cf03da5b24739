//! Config command - View and manage RetroSync configuration
//!
//! Provides the `retrosync config` CLI command which:
//! 1. Shows the loaded configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Persists the device address in the catalog settings

use anyhow::{Context, Result};
use clap::Subcommand;
use retrosync_core::config::{is_valid_host, SETTING_DEVICE_HOST, SETTING_DEVICE_PORT};
use tracing::info;

use super::CliContext;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Validate configuration file
    Validate,
    /// Store the device host and port used by every later command
    SetDevice {
        /// Hostname or IP address of the device
        host: String,
        /// HTTP port of the device's file server
        #[arg(default_value_t = 80)]
        port: u16,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx).await,
            ConfigCommand::Validate => self.execute_validate(ctx).await,
            ConfigCommand::SetDevice { host, port } => {
                self.execute_set_device(ctx, host, *port).await
            }
        }
    }

    async fn execute_show(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
            return Ok(());
        }

        formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
        formatter.info("");
        let yaml = serde_yaml::to_string(&ctx.config)
            .context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
        Ok(())
    }

    async fn execute_validate(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let errors = ctx.config.validate();

        if ctx.is_json() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": ctx.config_path.display().to_string(),
                "errors": messages,
            }));
        } else if errors.is_empty() {
            formatter.success(&format!(
                "Configuration is valid ({})",
                ctx.config_path.display()
            ));
        } else {
            for error in &errors {
                formatter.error(&error.to_string());
            }
        }

        if !errors.is_empty() {
            anyhow::bail!("configuration has {} error(s)", errors.len());
        }
        Ok(())
    }

    async fn execute_set_device(&self, ctx: &CliContext, host: &str, port: u16) -> Result<()> {
        let formatter = ctx.formatter();
        let host = host.trim();

        if !is_valid_host(host) {
            anyhow::bail!("'{host}' is not a valid hostname or IP address");
        }
        if port == 0 {
            anyhow::bail!("port must be between 1 and 65535");
        }

        let catalog = ctx.open_catalog().await?;
        catalog
            .set_setting(SETTING_DEVICE_HOST, host)
            .await
            .context("Failed to store device host")?;
        catalog
            .set_setting(SETTING_DEVICE_PORT, &port.to_string())
            .await
            .context("Failed to store device port")?;

        info!(host = %host, port, "Stored device address");

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "host": host,
                "port": port,
            }));
        } else {
            formatter.success(&format!("Device set to {host}:{port}"));
        }
        Ok(())
    }
}
