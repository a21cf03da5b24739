//! Sync command - Replace the device ROM set
//!
//! Provides the `retrosync sync <ids...>` CLI command which:
//! 1. Opens the catalog and resolves the device address
//! 2. Runs the five-phase sync, cancelled by Ctrl-C between items
//! 3. Prints one line per phase, or the whole SyncLog as JSON

use anyhow::{Context, Result};
use clap::Args;
use retrosync_core::domain::{PhaseAction, PhaseResult, PhaseStatus, RomId, SyncLog};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::CliContext;
use crate::output::{plural, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Catalog ids of the ROMs to put on the device
    #[arg(required = true, num_args = 1..)]
    pub ids: Vec<i64>,
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CliContext) -> Result<()> {
        let formatter = ctx.formatter();
        let orchestrator = ctx.orchestrator().await?;
        let ids: Vec<RomId> = self.ids.iter().copied().map(RomId::new).collect();

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current item");
                on_signal.cancel();
            }
        });

        formatter.info(&format!(
            "Syncing {} to {}",
            plural(ids.len(), "ROM"),
            orchestrator.client().base_url()
        ));

        let log = orchestrator.run(&ids, cancel).await?;
        info!(run_id = %log.run_id(), success = log.success(), "Sync command finished");

        if ctx.is_json() {
            let json = serde_json::to_value(&log).context("Failed to serialize sync log")?;
            formatter.print_json(&json);
        } else {
            print_summary(formatter.as_ref(), &log);
        }

        if !log.success() {
            anyhow::bail!("sync finished with {}", plural(log.errors().len(), "error"));
        }
        Ok(())
    }
}

fn print_summary(formatter: &dyn OutputFormatter, log: &SyncLog) {
    for result in log.phases() {
        let line = format!("{} {}", result.phase().key(), phase_detail(result));
        match result.status() {
            PhaseStatus::Completed => formatter.success(&line),
            _ => formatter.warn(&line),
        }
    }

    if log.is_cancelled() {
        formatter.warn("Sync was cancelled");
    }
    if log.success() {
        formatter.success("Sync completed");
    } else {
        for error in log.errors() {
            formatter.error(error);
        }
    }
}

fn phase_detail(result: &PhaseResult) -> String {
    let mut counts = (0usize, 0usize, 0usize);
    for action in result.actions() {
        match action {
            PhaseAction::Skipped { .. } => counts.1 += 1,
            PhaseAction::Failed { .. } => counts.2 += 1,
            PhaseAction::DirectoryEnsured { .. } | PhaseAction::PlaylistFound { .. } => {}
            _ => counts.0 += 1,
        }
    }
    format!(
        "({:?}): {} done, {} skipped, {} failed",
        result.status(),
        counts.0,
        counts.1,
        counts.2
    )
}
