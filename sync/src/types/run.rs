use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bail;
use crate::error::{ErrorKind, SyncError, SyncResult};

/// Kind of sync invocation a run record tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    /// A dry batch copy that never persists checkpoints.
    Test,
    /// Full transfer of the source table.
    Full,
    /// Watermark-bounded transfer of rows newer than the checkpoint.
    Incremental,
}

impl RunType {
    /// Returns the persisted string form of this run type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunType::Test => "test",
            RunType::Full => "full",
            RunType::Incremental => "incremental",
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunType {
    type Err = SyncError;

    /// Parses the persisted string form. Unknown strings are rejected rather
    /// than silently mapped to a default.
    fn from_str(value: &str) -> SyncResult<Self> {
        match value {
            "test" => Ok(RunType::Test),
            "full" => Ok(RunType::Full),
            "incremental" => Ok(RunType::Incremental),
            other => bail!(ErrorKind::DeserializationError, "Unknown run type", other),
        }
    }
}

/// Status of a sync run.
///
/// [`RunStatus::Running`] is the only initial state. `Completed`, `Failed`,
/// and `Stopped` are terminal; `Paused` is resumable back to `Running` only by
/// an explicit resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stopped,
    Paused,
}

impl RunStatus {
    /// Returns the persisted string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
            RunStatus::Paused => "paused",
        }
    }

    /// Returns whether this status ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Stopped
        )
    }

    /// Returns whether a transition from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        match self {
            RunStatus::Running => next != RunStatus::Running,
            // Pause is only ever left by an explicit resume or a stop.
            RunStatus::Paused => matches!(next, RunStatus::Running | RunStatus::Stopped),
            _ => false,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = SyncError;

    fn from_str(value: &str) -> SyncResult<Self> {
        match value {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "stopped" => Ok(RunStatus::Stopped),
            "paused" => Ok(RunStatus::Paused),
            other => bail!(ErrorKind::DeserializationError, "Unknown run status", other),
        }
    }
}

/// One record per sync invocation, appended to the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunRecord {
    pub run_id: Uuid,
    pub table_name: String,
    pub run_type: RunType,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_rows: u64,
    pub error_message: Option<String>,
}

impl RunRecord {
    /// Creates a new record in the [`RunStatus::Running`] state.
    pub fn new(table_name: impl Into<String>, run_type: RunType) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            table_name: table_name.into(),
            run_type,
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            total_rows: 0,
            error_message: None,
        }
    }

    /// Transitions the record to a new status, enforcing the state machine.
    ///
    /// Terminal statuses set `end_time`; resuming from pause clears nothing.
    pub fn transition_to(&mut self, next: RunStatus) -> SyncResult<()> {
        if !self.status.can_transition_to(next) {
            bail!(
                ErrorKind::InvalidState,
                "Invalid run status transition",
                format!("{} -> {}", self.status, next)
            );
        }

        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }

        Ok(())
    }

    /// Marks the run completed with its final row count.
    pub fn complete(&mut self, total_rows: u64) -> SyncResult<()> {
        self.total_rows = total_rows;
        self.transition_to(RunStatus::Completed)
    }

    /// Marks the run failed, recording the originating error message.
    pub fn fail(&mut self, error: &SyncError, total_rows: u64) -> SyncResult<()> {
        self.total_rows = total_rows;
        self.error_message = Some(error.to_string());
        self.transition_to(RunStatus::Failed)
    }

    /// Marks the run stopped with the rows transferred before the stop.
    pub fn stop(&mut self, total_rows: u64) -> SyncResult<()> {
        self.total_rows = total_rows;
        self.transition_to(RunStatus::Stopped)
    }
}

/// Summary of one sync run, returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Rows written to the destination during this run.
    pub rows_synced: u64,
    /// Number of batches committed.
    pub batches: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
    /// Final status of the run (`Completed` or `Stopped`).
    pub status: RunStatus,
    /// False when a checkpoint write failed and the run proceeded with an
    /// in-memory checkpoint only.
    pub checkpoint_durable: bool,
}

impl RunSummary {
    /// Returns throughput in rows per second, or `None` for an instant run.
    pub fn rows_per_second(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return None;
        }

        Some(self.rows_synced as f64 / secs)
    }
}
