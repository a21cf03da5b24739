//! Catalog command - Manage the local ROM catalog
//!
//! Provides the `retrosync catalog` CLI commands which:
//! 1. Add a ROM file, hashing its content with SHA-256
//! 2. List catalogued ROMs with optional filters
//! 3. List the known platforms

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use retrosync_cache::NewRom;
use retrosync_core::domain::{base_name, ContentHash};
use retrosync_core::ports::{ICatalogGateway, RomFilter};
use sha2::{Digest, Sha256};
use tracing::info;

use super::CliContext;
use crate::output::plural;

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Add a ROM file to the catalog
    Add {
        /// Path to the ROM file
        path: PathBuf,
        /// Platform short name (e.g., "snes")
        #[arg(long)]
        platform: String,
        /// Display title; defaults to the file name without extension
        #[arg(long)]
        title: Option<String>,
    },
    /// List catalogued ROMs
    List {
        /// Only ROMs of this platform short name
        #[arg(long)]
        platform: Option<String>,
        /// Case-insensitive title substring
        #[arg(long)]
        search: Option<String>,
    },
    /// List known platforms
    Platforms,
}

impl CatalogCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        match self {
            CatalogCommand::Add {
                path,
                platform,
                title,
            } => self.execute_add(ctx, path, platform, title.as_deref()).await,
            CatalogCommand::List { platform, search } => {
                self.execute_list(ctx, platform.as_deref(), search.as_deref())
                    .await
            }
            CatalogCommand::Platforms => self.execute_platforms(ctx).await,
        }
    }

    async fn execute_add(
        &self,
        ctx: &CliContext,
        path: &Path,
        platform: &str,
        title: Option<&str>,
    ) -> Result<()> {
        let formatter = ctx.formatter();
        let catalog = ctx.open_catalog().await?;

        let Some(platform) = catalog.platform_by_short_name(platform).await? else {
            anyhow::bail!(
                "unknown platform '{platform}', run 'retrosync catalog platforms' for the list"
            );
        };

        let file_path = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("{} has no file name", file_path.display()))?;

        let hash_path = file_path.clone();
        let digest = tokio::task::spawn_blocking(move || hash_file(&hash_path))
            .await
            .context("Hashing task panicked")??;
        let content_hash = ContentHash::new(digest).context("Invalid content hash")?;

        let title = title
            .map(str::to_string)
            .unwrap_or_else(|| base_name(&file_name).to_string());
        let rom = NewRom {
            title,
            platform_id: platform.id,
            file_name,
            file_path,
            content_hash: Some(content_hash.clone()),
        };
        let id = catalog.insert_rom(&rom).await.context("Failed to insert ROM")?;

        info!(rom_id = %id, hash = %content_hash, "Added ROM to catalog");

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "id": id,
                "title": rom.title,
                "platform": platform.short_name,
                "file_name": rom.file_name,
                "file_content_hash": content_hash,
            }));
        } else {
            formatter.success(&format!("Added '{}' as ROM {}", rom.title, id));
            formatter.field("Platform", &platform.name);
            formatter.field("File", &rom.file_path.display().to_string());
            formatter.field("SHA-256", content_hash.as_str());
        }
        Ok(())
    }

    async fn execute_list(
        &self,
        ctx: &CliContext,
        platform: Option<&str>,
        search: Option<&str>,
    ) -> Result<()> {
        let formatter = ctx.formatter();
        let catalog = ctx.open_catalog().await?;

        let mut filter = RomFilter::new();
        if let Some(short_name) = platform {
            match catalog.platform_by_short_name(short_name).await? {
                Some(p) => filter = filter.with_platform(p.id),
                None => anyhow::bail!("unknown platform '{short_name}'"),
            }
        }
        if let Some(search) = search {
            filter = filter.with_search(search);
        }

        let roms = catalog.get_all(&filter).await?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&roms)?);
            return Ok(());
        }

        formatter.success(&format!("{} in catalog", plural(roms.len(), "ROM")));
        for rom in &roms {
            formatter.info(&format!(
                "{:>5}  {:<40} {}",
                rom.id,
                rom.title,
                rom.file_name
            ));
        }
        Ok(())
    }

    async fn execute_platforms(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let catalog = ctx.open_catalog().await?;
        let platforms = catalog.list_platforms().await?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::to_value(&platforms)?);
            return Ok(());
        }

        for platform in &platforms {
            formatter.field(&platform.short_name, &platform.name);
        }
        Ok(())
    }
}

/// Lowercase hex SHA-256 of a file's bytes
fn hash_file(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(
            hash_file(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
