//! Five-phase device resynchronization
//!
//! A sync replaces the ROM set on the device with a new selection while
//! keeping every save and state file attached to the ROM it belongs to:
//!
//! 1. **Backup** - copy saves for the ROMs currently on the device, keyed by
//!    content hash
//! 2. **Clear** - empty `downloads/` and `playlists/`, recreating them if the
//!    device removed them
//! 3. **Push** - re-assert the critical directories and upload the selection
//! 4. **Playlists** - one playlist per platform of the selection
//! 5. **Restore** - upload the stored saves of the selected ROMs
//!
//! Phases run strictly in order and items inside a phase run one at a
//! time. A failing item is recorded and the run moves on; only an empty
//! resolution aborts before phase 1.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use retrosync_core::domain::{
    base_name, ContentHash, DevicePath, Phase, PhaseAction, PhaseResult, PlatformId, RemoteError,
    RomId, SyncLog, SyncTarget,
};
use retrosync_core::ports::{
    CatalogPlatform, CatalogRom, ICatalogGateway, IPlaylistMaterializer, RomFilter, UploadBody,
};
use retrosync_device::{CreateOutcome, RemoteStorageClient};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup_store::SaveBackupStore;
use crate::SyncError;

const CANCELLED: &str = "cancelled";

/// Result of a standalone push
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Device file names uploaded
    pub pushed: Vec<String>,
    /// `(item, error)` for everything that could not be pushed
    pub failed: Vec<(String, String)>,
}

/// Runs syncs and pushes against one device
pub struct SyncOrchestrator {
    catalog: Arc<dyn ICatalogGateway>,
    client: RemoteStorageClient,
    backups: SaveBackupStore,
    playlists: Arc<dyn IPlaylistMaterializer>,
}

impl SyncOrchestrator {
    pub fn new(
        catalog: Arc<dyn ICatalogGateway>,
        client: RemoteStorageClient,
        backups: SaveBackupStore,
        playlists: Arc<dyn IPlaylistMaterializer>,
    ) -> Self {
        Self {
            catalog,
            client,
            backups,
            playlists,
        }
    }

    pub fn client(&self) -> &RemoteStorageClient {
        &self.client
    }

    pub fn backups(&self) -> &SaveBackupStore {
        &self.backups
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Replaces the device's ROM set with `rom_ids`
    ///
    /// Every phase ends in a terminal status, including after cancellation.
    ///
    /// # Errors
    /// Returns [`SyncError::NoValidRoms`] when none of the ids resolve. All
    /// other failures are recorded in the returned [`SyncLog`].
    #[tracing::instrument(skip(self, rom_ids, cancel), fields(roms = rom_ids.len()))]
    pub async fn run(
        &self,
        rom_ids: &[RomId],
        cancel: CancellationToken,
    ) -> Result<SyncLog, SyncError> {
        let mut log = SyncLog::new();
        let targets = self.resolve(rom_ids, &mut log).await?;

        info!(run_id = %log.run_id(), targets = targets.len(), "Starting sync");

        let mut failed_backups: HashSet<ContentHash> = HashSet::new();

        for phase in Phase::ALL {
            let mut result = PhaseResult::new(phase);
            if let Err(e) = result.start() {
                warn!(phase = %phase.key(), error = %e, "Phase could not start");
            }

            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
            } else {
                match phase {
                    Phase::Backup => {
                        self.backup_phase(&mut result, &mut failed_backups, &cancel)
                            .await
                    }
                    Phase::Clear => self.clear_phase(&mut result, &cancel).await,
                    Phase::Push => self.push_phase(&mut result, &targets, &cancel).await,
                    Phase::Playlists => self.playlists_phase(&mut result, &targets, &cancel).await,
                    Phase::Restore => {
                        self.restore_phase(&mut result, &targets, &failed_backups, &cancel)
                            .await
                    }
                }
            }

            match result.finish() {
                Ok(status) => info!(
                    phase = %phase.key(),
                    status = ?status,
                    actions = result.actions().len(),
                    errors = result.errors().len(),
                    "Phase finished"
                ),
                Err(e) => warn!(phase = %phase.key(), error = %e, "Phase could not finish"),
            }
            log.record_phase(result);
        }

        if cancel.is_cancelled() {
            log.mark_cancelled();
        }
        log.finish();

        info!(
            run_id = %log.run_id(),
            success = log.success(),
            errors = log.errors().len(),
            cancelled = log.is_cancelled(),
            "Sync finished"
        );
        Ok(log)
    }

    /// Phase 1: back up saves for every catalogued ROM on the device
    async fn backup_phase(
        &self,
        result: &mut PhaseResult,
        failed_backups: &mut HashSet<ContentHash>,
        cancel: &CancellationToken,
    ) {
        match self.client.list_directory(&DevicePath::playlists()).await {
            Ok(entries) => {
                for entry in entries.iter().filter(|e| e.is_visible_file()) {
                    result.record(PhaseAction::PlaylistFound {
                        name: entry.name.clone(),
                    });
                }
            }
            Err(e) if e.is_not_found() => debug!("No playlists directory on device"),
            Err(e) => result.record(PhaseAction::Skipped {
                item: DevicePath::playlists().dir_query(),
                reason: e.to_string(),
            }),
        }

        let on_device = match self.client.list_directory(&DevicePath::downloads()).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => {
                debug!("No downloads directory on device, nothing to back up");
                return;
            }
            Err(e) => {
                result.record_failure(DevicePath::downloads().dir_query(), e);
                return;
            }
        };

        let catalog = match self.catalog.get_all(&RomFilter::new()).await {
            Ok(roms) => roms,
            Err(e) => {
                result.record_failure("catalog", e);
                return;
            }
        };
        let by_file_name: HashMap<&str, &CatalogRom> =
            catalog.iter().map(|rom| (rom.file_name.as_str(), rom)).collect();
        let mut platforms: HashMap<PlatformId, CatalogPlatform> = HashMap::new();

        for entry in on_device.iter().filter(|e| e.is_visible_file()) {
            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
                return;
            }

            let Some(rom) = by_file_name.get(entry.name.as_str()) else {
                info!(file = %entry.name, "Device file not in catalog, skipping backup");
                result.record(PhaseAction::Skipped {
                    item: entry.name.clone(),
                    reason: "no catalog entry".to_string(),
                });
                continue;
            };

            let platform = match platforms.get(&rom.platform_id) {
                Some(platform) => platform.clone(),
                None => match self.catalog.get_platform_by_id(rom.platform_id).await {
                    Ok(platform) => {
                        platforms.insert(rom.platform_id, platform.clone());
                        platform
                    }
                    Err(e) => {
                        result.record_failure(&entry.name, e);
                        continue;
                    }
                },
            };

            let Some(core) = self.playlists.core_directory_for(&platform.short_name) else {
                result.record(PhaseAction::Skipped {
                    item: entry.name.clone(),
                    reason: format!("no core mapping for platform '{}'", platform.short_name),
                });
                continue;
            };

            let Some(hash) = rom
                .file_content_hash
                .as_deref()
                .and_then(|h| ContentHash::new(h).ok())
            else {
                result.record(PhaseAction::Skipped {
                    item: entry.name.clone(),
                    reason: "no content hash".to_string(),
                });
                continue;
            };

            match self.backups.backup(&core, base_name(&entry.name), &hash).await {
                Ok(files) => result.record(PhaseAction::BackedUp {
                    rom_id: rom.id,
                    content_hash: hash,
                    files,
                }),
                Err(e) => {
                    warn!(file = %entry.name, key = %hash, error = %e, "Backup failed");
                    result.record_failure(&entry.name, e);
                    failed_backups.insert(hash);
                }
            }
        }
    }

    /// Phase 2: empty `downloads/` and `playlists/`
    async fn clear_phase(&self, result: &mut PhaseResult, cancel: &CancellationToken) {
        for dir in [DevicePath::downloads(), DevicePath::playlists()] {
            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
                return;
            }

            let outcome = match self.client.clear_directory(&dir, cancel).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    result.record_failure(dir.dir_query(), e);
                    continue;
                }
            };

            for name in &outcome.deleted {
                let path = dir.join(name).map(|p| p.file_query()).unwrap_or_else(|_| name.clone());
                result.record(PhaseAction::Deleted { path });
            }
            for name in &outcome.skipped {
                result.record(PhaseAction::Skipped {
                    item: name.clone(),
                    reason: "hidden file or directory".to_string(),
                });
            }
            for (name, reason) in &outcome.failed {
                result.record_failure(name, reason);
            }
            if outcome.recreated {
                result.record(PhaseAction::DirectoryEnsured {
                    path: dir.dir_query(),
                    created: true,
                });
            }
            if let Some(repair) = &outcome.repair_error {
                error!(path = %dir, error = %repair, "Directory missing after clear");
                result.record_failure(dir.dir_query(), repair);
            }
            if outcome.interrupted {
                result.record_error(format!("{}: {CANCELLED}", dir.dir_query()));
                return;
            }
        }
    }

    /// Phase 3: critical directories, then the ROM uploads
    async fn push_phase(
        &self,
        result: &mut PhaseResult,
        targets: &[SyncTarget],
        cancel: &CancellationToken,
    ) {
        self.ensure_directories(result).await;

        for target in targets {
            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
                return;
            }

            match self.push_one(target).await {
                Ok(()) => result.record(PhaseAction::Pushed {
                    rom_id: target.id,
                    file_name: target.device_file_name.clone(),
                }),
                Err(e) => result.record_failure(&target.device_file_name, e),
            }
        }
    }

    /// Phase 4: one playlist per platform of the selection
    async fn playlists_phase(
        &self,
        result: &mut PhaseResult,
        targets: &[SyncTarget],
        cancel: &CancellationToken,
    ) {
        let mut groups: BTreeMap<PlatformId, Vec<SyncTarget>> = BTreeMap::new();
        for target in targets {
            groups.entry(target.platform_id).or_default().push(target.clone());
        }

        for roms in groups.values() {
            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
                return;
            }
            let Some(first) = roms.first() else {
                continue;
            };

            let filename = self.playlists.filename_for(&first.platform_name);
            let bytes = match self
                .playlists
                .build(&first.platform_short_name, roms)
                .and_then(|doc| doc.to_bytes())
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    result.record_failure(&filename, e);
                    continue;
                }
            };

            match self
                .client
                .upload_file(&DevicePath::playlists(), &filename, UploadBody::Bytes(bytes))
                .await
            {
                Ok(()) => result.record(PhaseAction::PlaylistUploaded {
                    platform: first.platform_short_name.clone(),
                    filename,
                    rom_count: roms.len(),
                }),
                Err(e) => result.record_failure(&filename, e),
            }
        }
    }

    /// Phase 5: stored saves back onto the device
    async fn restore_phase(
        &self,
        result: &mut PhaseResult,
        targets: &[SyncTarget],
        failed_backups: &HashSet<ContentHash>,
        cancel: &CancellationToken,
    ) {
        let mut seen: HashSet<&ContentHash> = HashSet::new();

        for target in targets {
            if !seen.insert(&target.content_hash) {
                continue;
            }
            if cancel.is_cancelled() {
                result.record_error(CANCELLED);
                return;
            }

            let item = target.content_hash.to_string();
            if failed_backups.contains(&target.content_hash) {
                result.record(PhaseAction::Skipped {
                    item,
                    reason: "backup failed earlier in this run".to_string(),
                });
                continue;
            }
            let Some(core) = target.core_directory.as_deref() else {
                result.record(PhaseAction::Skipped {
                    item,
                    reason: format!(
                        "no core mapping for platform '{}'",
                        target.platform_short_name
                    ),
                });
                continue;
            };

            match self.backups.restore(core, &target.content_hash).await {
                Ok(files) if files.is_empty() => result.record(PhaseAction::Skipped {
                    item,
                    reason: "no backup".to_string(),
                }),
                Ok(files) => result.record(PhaseAction::Restored {
                    content_hash: target.content_hash.clone(),
                    files,
                }),
                Err(e) => result.record_failure(&item, e),
            }
        }
    }

    // ========================================================================
    // Push
    // ========================================================================

    /// Uploads `rom_ids` without touching saves or playlists
    ///
    /// # Errors
    /// Returns [`SyncError::NoValidRoms`] when none of the ids resolve.
    #[tracing::instrument(skip(self, rom_ids), fields(roms = rom_ids.len()))]
    pub async fn push(&self, rom_ids: &[RomId]) -> Result<PushReport, SyncError> {
        let mut log = SyncLog::new();
        let targets = self.resolve(rom_ids, &mut log).await?;
        let mut report = PushReport::default();
        for err in log.errors() {
            report.failed.push(("preflight".to_string(), err.clone()));
        }

        for (dir, outcome) in self.client.ensure_critical_directories().await {
            if let Err(e) = outcome {
                report.failed.push((dir.dir_query(), e.to_string()));
            }
        }

        for target in &targets {
            match self.push_one(target).await {
                Ok(()) => report.pushed.push(target.device_file_name.clone()),
                Err(e) => report
                    .failed
                    .push((target.device_file_name.clone(), e.to_string())),
            }
        }

        info!(pushed = report.pushed.len(), failed = report.failed.len(), "Push finished");
        Ok(report)
    }

    async fn push_one(&self, target: &SyncTarget) -> Result<(), RemoteError> {
        self.client
            .upload_file(
                &DevicePath::downloads(),
                &target.device_file_name,
                UploadBody::File(target.local_file_path.clone()),
            )
            .await
    }

    async fn ensure_directories(&self, result: &mut PhaseResult) {
        for (dir, outcome) in self.client.ensure_critical_directories().await {
            match outcome {
                Ok(created) => result.record(PhaseAction::DirectoryEnsured {
                    path: dir.dir_query(),
                    created: created == CreateOutcome::Created,
                }),
                Err(e) => result.record_failure(dir.dir_query(), e),
            }
        }
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Loads catalog data for each id; failures go to `log` as preflight errors
    async fn resolve(
        &self,
        rom_ids: &[RomId],
        log: &mut SyncLog,
    ) -> Result<Vec<SyncTarget>, SyncError> {
        let mut seen = HashSet::new();
        let mut targets = Vec::with_capacity(rom_ids.len());

        for &id in rom_ids {
            if !seen.insert(id) {
                continue;
            }
            match self.resolve_one(id).await {
                Ok(target) => targets.push(target),
                Err(reason) => {
                    warn!(rom_id = %id, %reason, "Could not resolve ROM");
                    log.record_error("preflight", format!("ROM {id}: {reason}"));
                }
            }
        }

        if targets.is_empty() {
            return Err(SyncError::NoValidRoms {
                errors: log.errors().to_vec(),
            });
        }
        Ok(targets)
    }

    async fn resolve_one(&self, id: RomId) -> Result<SyncTarget, String> {
        let rom = self.catalog.get_by_id(id).await.map_err(|e| e.to_string())?;
        let platform = self
            .catalog
            .get_platform_by_id(rom.platform_id)
            .await
            .map_err(|e| e.to_string())?;
        let content_hash = rom
            .file_content_hash
            .as_deref()
            .ok_or_else(|| "no content hash".to_string())
            .and_then(|h| ContentHash::new(h).map_err(|e| e.to_string()))?;

        Ok(SyncTarget {
            id: rom.id,
            title: rom.title,
            platform_id: platform.id,
            core_directory: self.playlists.core_directory_for(&platform.short_name),
            platform_short_name: platform.short_name,
            platform_name: platform.name,
            content_hash,
            local_file_path: rom.file_path,
            device_file_name: rom.file_name,
        })
    }
}
