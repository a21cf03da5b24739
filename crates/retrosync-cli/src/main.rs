//! RetroSync CLI - Command-line interface for RetroSync
//!
//! Provides commands for:
//! - Resynchronizing the device ROM set with save preservation
//! - Pushing ROMs without a full sync
//! - Checking the device connection
//! - Managing the local catalog and inspecting save backups

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use retrosync_core::config::Config;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    backups::BackupsCommand, catalog::CatalogCommand, config::ConfigCommand, push::PushCommand,
    status::StatusCommand, sync::SyncCommand, CliContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "retrosync",
    version,
    about = "Sync ROMs, playlists and saves to a RetroArch device"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace the device ROM set, keeping saves with their ROMs
    Sync(SyncCommand),
    /// Upload ROMs without touching saves or playlists
    Push(PushCommand),
    /// Show device connection and content
    Status(StatusCommand),
    /// Manage the local ROM catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
    /// List stored save backups
    Backups(BackupsCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    let filter = match cli.verbose {
        0 => config.logging.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let ctx = CliContext::new(format, config_path, config);

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Push(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Catalog(cmd) => cmd.execute(&ctx).await,
        Commands::Backups(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
