//! Push command - Upload ROMs without a full sync

use anyhow::{Context, Result};
use clap::Args;
use retrosync_core::domain::RomId;

use super::CliContext;
use crate::output::plural;

#[derive(Debug, Args)]
pub struct PushCommand {
    /// Catalog ids of the ROMs to upload
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

impl PushCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let orchestrator = ctx.orchestrator().await?;
        let ids: Vec<RomId> = self.ids.iter().copied().map(RomId::new).collect();

        let report = orchestrator.push(&ids).await?;

        if ctx.is_json() {
            let json = serde_json::to_value(&report).context("Failed to serialize push report")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Pushed {}", plural(report.pushed.len(), "ROM")));
            for name in &report.pushed {
                formatter.info(name);
            }
            for (item, error) in &report.failed {
                formatter.error(&format!("{item}: {error}"));
            }
        }

        if !report.failed.is_empty() {
            anyhow::bail!("{} could not be pushed", plural(report.failed.len(), "item"));
        }
        Ok(())
    }
}
