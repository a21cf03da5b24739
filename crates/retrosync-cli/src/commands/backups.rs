//! Backups command - Inspect the local save backup store

use std::collections::HashMap;

use anyhow::{Context, Result};
use clap::Args;
use retrosync_core::ports::{ICatalogGateway, RomFilter};
use retrosync_sync::SaveBackupStore;

use super::CliContext;
use crate::output::plural;

#[derive(Debug, Args)]
pub struct BackupsCommand {
    /// Also list the stored file names
    #[arg(long)]
    pub files: bool,
}

impl BackupsCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let catalog = ctx.open_catalog().await?;
        let client = ctx.client(&catalog).await?;
        let store = SaveBackupStore::new(ctx.config.storage.backup_root.clone(), client);

        let sets = store.list().await.context("Failed to read backup store")?;

        // Several catalog entries may share one content hash
        let mut titles: HashMap<String, Vec<String>> = HashMap::new();
        for rom in catalog.get_all(&RomFilter::new()).await? {
            if let Some(hash) = rom.file_content_hash {
                titles.entry(hash.to_lowercase()).or_default().push(rom.title);
            }
        }

        if ctx.is_json() {
            let json: Vec<_> = sets
                .iter()
                .map(|set| {
                    let key = set.key.as_ref().map(|k| k.as_str().to_string());
                    let roms = key
                        .as_ref()
                        .and_then(|k| titles.get(k))
                        .cloned()
                        .unwrap_or_default();
                    serde_json::json!({
                        "content_hash": key,
                        "roms": roms,
                        "saves": set.saves,
                        "states": set.states,
                    })
                })
                .collect();
            formatter.print_json(&serde_json::json!(json));
            return Ok(());
        }

        formatter.success(&format!(
            "{} in {}",
            plural(sets.len(), "backup"),
            store.root().display()
        ));
        for set in &sets {
            let Some(key) = set.key.as_ref() else { continue };
            let label = titles
                .get(key.as_str())
                .map(|t| t.join(", "))
                .unwrap_or_else(|| "(not in catalog)".to_string());
            formatter.field(
                &label,
                &format!(
                    "{}, {} [{}]",
                    plural(set.saves.len(), "save"),
                    plural(set.states.len(), "state"),
                    &key.as_str()[..12.min(key.as_str().len())]
                ),
            );
            if self.files {
                for path in set.relative_paths() {
                    formatter.info(&format!("  {path}"));
                }
            }
        }
        Ok(())
    }
}
