//! Sync phases and the aggregate sync log
//!
//! ## State Machine
//!
//! ```text
//!     ┌─────────┐  start   ┌────────────┐  finish   ┌───────────┐
//!     │ Pending │ ───────► │ InProgress │ ────────► │ Completed │
//!     └─────────┘          └────────────┘     │     └───────────┘
//!                                             │     ┌───────────┐
//!                                             └───► │  Failed   │
//!                                                   └───────────┘
//! ```
//!
//! A phase is never re-entered. `finish` picks the terminal status from the
//! recorded errors: any error means `Failed`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::newtypes::{ContentHash, RomId};

// ============================================================================
// Phase
// ============================================================================

/// The five ordered steps of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Backup,
    Clear,
    Push,
    Playlists,
    Restore,
}

impl Phase {
    /// All phases in execution order
    pub const ALL: [Phase; 5] = [
        Phase::Backup,
        Phase::Clear,
        Phase::Push,
        Phase::Playlists,
        Phase::Restore,
    ];

    /// 1-based position in the run
    pub fn number(&self) -> u8 {
        match self {
            Phase::Backup => 1,
            Phase::Clear => 2,
            Phase::Push => 3,
            Phase::Playlists => 4,
            Phase::Restore => 5,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Backup => "backup",
            Phase::Clear => "clear",
            Phase::Push => "push",
            Phase::Playlists => "playlists",
            Phase::Restore => "restore",
        }
    }

    /// Key used in serialized logs, e.g. `phase3_push`
    pub fn key(&self) -> String {
        format!("phase{}_{}", self.number(), self.name())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// PhaseStatus
// ============================================================================

/// Status of a single phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl PhaseStatus {
    /// Returns true for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, PhaseStatus::Completed | PhaseStatus::Failed)
    }

    /// Checks if a transition to the target status is valid
    pub fn can_transition_to(&self, target: PhaseStatus) -> bool {
        matches!(
            (self, target),
            (PhaseStatus::Pending, PhaseStatus::InProgress)
                | (PhaseStatus::InProgress, PhaseStatus::Completed)
                | (PhaseStatus::InProgress, PhaseStatus::Failed)
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::Pending => write!(f, "pending"),
            PhaseStatus::InProgress => write!(f, "in_progress"),
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
        }
    }
}

// ============================================================================
// PhaseAction
// ============================================================================

/// One auditable thing a phase did (or declined to do)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PhaseAction {
    /// Save/state files copied from the device into the backup store
    BackedUp {
        rom_id: RomId,
        content_hash: ContentHash,
        files: Vec<String>,
    },
    /// A playlist that was on the device before the clear
    PlaylistFound { name: String },
    /// A file removed from the device
    Deleted { path: String },
    /// A directory created (or confirmed present) on the device
    DirectoryEnsured { path: String, created: bool },
    /// A ROM file uploaded into `downloads/`
    Pushed { rom_id: RomId, file_name: String },
    /// A playlist document uploaded into `playlists/`
    PlaylistUploaded {
        platform: String,
        filename: String,
        rom_count: usize,
    },
    /// Backed-up files uploaded back onto the device
    Restored {
        content_hash: ContentHash,
        files: Vec<String>,
    },
    /// An item that was deliberately not processed
    Skipped { item: String, reason: String },
    /// An item that was attempted and failed
    Failed { item: String, error: String },
}

// ============================================================================
// PhaseResult
// ============================================================================

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseResult {
    phase: Phase,
    status: PhaseStatus,
    actions: Vec<PhaseAction>,
    errors: Vec<String>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl PhaseResult {
    /// Creates a pending result for the given phase
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
            actions: Vec::new(),
            errors: Vec::new(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn actions(&self) -> &[PhaseAction] {
        &self.actions
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Moves the phase from `Pending` to `InProgress`
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the phase was already entered.
    pub fn start(&mut self) -> Result<(), DomainError> {
        self.transition(PhaseStatus::InProgress)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn record(&mut self, action: PhaseAction) {
        self.actions.push(action);
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Records a failed item both as an action and as an error
    pub fn record_failure(&mut self, item: impl Into<String>, error: impl fmt::Display) {
        let item = item.into();
        let error = error.to_string();
        self.errors.push(format!("{item}: {error}"));
        self.actions.push(PhaseAction::Failed { item, error });
    }

    /// Moves the phase to its terminal status
    ///
    /// `Failed` if any error was recorded, `Completed` otherwise.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidState` if the phase is not in progress.
    pub fn finish(&mut self) -> Result<PhaseStatus, DomainError> {
        let target = if self.errors.is_empty() {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Failed
        };
        self.transition(target)?;
        self.finished_at = Some(Utc::now());
        Ok(target)
    }

    fn transition(&mut self, target: PhaseStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        self.status = target;
        Ok(())
    }

    /// File names recorded by `Pushed` actions
    pub fn pushed_files(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                PhaseAction::Pushed { file_name, .. } => Some(file_name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Paths recorded by `Deleted` actions
    pub fn deleted_paths(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                PhaseAction::Deleted { path } => Some(path.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of items that were skipped
    pub fn skipped_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| matches!(a, PhaseAction::Skipped { .. }))
            .count()
    }
}

// ============================================================================
// SyncLog
// ============================================================================

/// Aggregate result of a sync run
///
/// `success` is true exactly when the flat error list is empty, whatever
/// the individual phase statuses say. It is derived on every read and
/// written out for consumers of the JSON log, but never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SyncLogRecord", from = "SyncLogRecord")]
pub struct SyncLog {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    phase1_backup: PhaseResult,
    phase2_clear: PhaseResult,
    phase3_push: PhaseResult,
    phase4_playlists: PhaseResult,
    phase5_restore: PhaseResult,
    errors: Vec<String>,
    cancelled: bool,
}

/// Serialized form of [`SyncLog`]
#[derive(Serialize, Deserialize)]
struct SyncLogRecord {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    phase1_backup: PhaseResult,
    phase2_clear: PhaseResult,
    phase3_push: PhaseResult,
    phase4_playlists: PhaseResult,
    phase5_restore: PhaseResult,
    errors: Vec<String>,
    #[serde(default)]
    cancelled: bool,
    #[serde(default)]
    success: bool,
}

impl From<SyncLog> for SyncLogRecord {
    fn from(log: SyncLog) -> Self {
        Self {
            success: log.success(),
            run_id: log.run_id,
            started_at: log.started_at,
            finished_at: log.finished_at,
            phase1_backup: log.phase1_backup,
            phase2_clear: log.phase2_clear,
            phase3_push: log.phase3_push,
            phase4_playlists: log.phase4_playlists,
            phase5_restore: log.phase5_restore,
            errors: log.errors,
            cancelled: log.cancelled,
        }
    }
}

impl From<SyncLogRecord> for SyncLog {
    fn from(record: SyncLogRecord) -> Self {
        Self {
            run_id: record.run_id,
            started_at: record.started_at,
            finished_at: record.finished_at,
            phase1_backup: record.phase1_backup,
            phase2_clear: record.phase2_clear,
            phase3_push: record.phase3_push,
            phase4_playlists: record.phase4_playlists,
            phase5_restore: record.phase5_restore,
            errors: record.errors,
            cancelled: record.cancelled,
        }
    }
}

impl Default for SyncLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncLog {
    /// Creates a log with all five phases pending
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            phase1_backup: PhaseResult::new(Phase::Backup),
            phase2_clear: PhaseResult::new(Phase::Clear),
            phase3_push: PhaseResult::new(Phase::Push),
            phase4_playlists: PhaseResult::new(Phase::Playlists),
            phase5_restore: PhaseResult::new(Phase::Restore),
            errors: Vec::new(),
            cancelled: false,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn phase(&self, phase: Phase) -> &PhaseResult {
        match phase {
            Phase::Backup => &self.phase1_backup,
            Phase::Clear => &self.phase2_clear,
            Phase::Push => &self.phase3_push,
            Phase::Playlists => &self.phase4_playlists,
            Phase::Restore => &self.phase5_restore,
        }
    }

    fn phase_slot(&mut self, phase: Phase) -> &mut PhaseResult {
        match phase {
            Phase::Backup => &mut self.phase1_backup,
            Phase::Clear => &mut self.phase2_clear,
            Phase::Push => &mut self.phase3_push,
            Phase::Playlists => &mut self.phase4_playlists,
            Phase::Restore => &mut self.phase5_restore,
        }
    }

    /// All phases in execution order
    pub fn phases(&self) -> impl Iterator<Item = &PhaseResult> {
        Phase::ALL.into_iter().map(move |p| self.phase(p))
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Appends an error that does not belong to a phase (e.g. preflight)
    pub fn record_error(&mut self, context: &str, error: impl fmt::Display) {
        self.errors.push(format!("{context}: {error}"));
    }

    /// Stores a finished phase and folds its errors into the flat list
    pub fn record_phase(&mut self, result: PhaseResult) {
        let phase = result.phase();
        for error in result.errors() {
            self.errors.push(format!("{}: {error}", phase.key()));
        }
        *self.phase_slot(phase) = result;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_keys() {
        let keys: Vec<String> = Phase::ALL.iter().map(Phase::key).collect();
        assert_eq!(
            keys,
            vec![
                "phase1_backup",
                "phase2_clear",
                "phase3_push",
                "phase4_playlists",
                "phase5_restore"
            ]
        );
    }

    #[test]
    fn test_status_transitions_are_monotonic() {
        use PhaseStatus::*;
        assert!(Pending.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(InProgress));
        assert!(!Failed.can_transition_to(InProgress));
        assert!(!Completed.can_transition_to(Failed));
    }

    #[test]
    fn test_phase_never_reentered() {
        let mut result = PhaseResult::new(Phase::Push);
        result.start().unwrap();
        assert!(result.start().is_err());
        assert_eq!(result.finish().unwrap(), PhaseStatus::Completed);
        assert!(result.start().is_err());
        assert!(result.finish().is_err());
    }

    #[test]
    fn test_finish_without_start_fails() {
        let mut result = PhaseResult::new(Phase::Clear);
        let err = result.finish().unwrap_err();
        assert!(matches!(err, DomainError::InvalidState { .. }));
        assert_eq!(result.status(), PhaseStatus::Pending);
    }

    #[test]
    fn test_errors_make_phase_failed() {
        let mut result = PhaseResult::new(Phase::Restore);
        result.start().unwrap();
        result.record_failure("aaa", "device unavailable");
        assert_eq!(result.finish().unwrap(), PhaseStatus::Failed);
        assert_eq!(result.errors(), &["aaa: device unavailable".to_string()]);
        assert!(matches!(result.actions()[0], PhaseAction::Failed { .. }));
    }

    #[test]
    fn test_empty_phase_is_completed() {
        let mut result = PhaseResult::new(Phase::Playlists);
        result.start().unwrap();
        assert_eq!(result.finish().unwrap(), PhaseStatus::Completed);
    }

    #[test]
    fn test_sync_log_success_follows_errors() {
        let mut log = SyncLog::new();
        assert!(log.success());

        let mut push = PhaseResult::new(Phase::Push);
        push.start().unwrap();
        push.record(PhaseAction::Pushed {
            rom_id: RomId::new(1),
            file_name: "mario.sfc".to_string(),
        });
        push.finish().unwrap();
        log.record_phase(push);
        assert!(log.success());
        assert_eq!(log.phase(Phase::Push).pushed_files(), vec!["mario.sfc"]);

        let mut backup = PhaseResult::new(Phase::Backup);
        backup.start().unwrap();
        backup.record_error("device unreachable");
        backup.finish().unwrap();
        log.record_phase(backup);

        assert!(!log.success());
        assert_eq!(log.errors(), &["phase1_backup: device unreachable".to_string()]);
    }

    #[test]
    fn test_sync_log_serializes_phase_keys() {
        let mut log = SyncLog::new();
        log.record_error("preflight", "ROM 7 not found");
        log.finish();

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["phase3_push"]["status"], "pending");
        assert_eq!(json["errors"][0], "preflight: ROM 7 not found");
        assert!(json["finished_at"].is_string());
    }

    #[test]
    fn test_deserialized_log_derives_success_from_errors() {
        let mut log = SyncLog::new();
        log.record_error("preflight", "ROM 7 not found");
        let mut json = serde_json::to_value(&log).unwrap();
        json["success"] = serde_json::Value::Bool(true);

        let parsed: SyncLog = serde_json::from_value(json).unwrap();

        assert!(!parsed.success());
        assert_eq!(parsed, log);
        assert_eq!(serde_json::to_value(&parsed).unwrap()["success"], false);
    }

    #[test]
    fn test_action_serialization_is_tagged() {
        let action = PhaseAction::PlaylistUploaded {
            platform: "snes".to_string(),
            filename: "Nintendo - Super Nintendo Entertainment System.lpl".to_string(),
            rom_count: 2,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "playlist_uploaded");
        assert_eq!(json["rom_count"], 2);
    }
}
