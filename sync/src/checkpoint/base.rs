use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncResult;
use crate::types::Watermark;

/// Persisted marker of replication progress for one destination table.
///
/// The watermark is monotonic across successful runs: [`Checkpoint::advance_to`]
/// only ever moves it forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Checkpoint {
    pub table_name: String,
    /// Last replicated watermark, absent until the first successful
    /// incremental batch.
    pub last_sync_value: Option<Watermark>,
    /// When the checkpoint was last advanced.
    pub last_sync_time: DateTime<Utc>,
    /// Row statistics of the last run.
    pub row_count: u64,
}

impl Checkpoint {
    /// Creates an empty checkpoint for a table with no prior runs.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            last_sync_value: None,
            last_sync_time: Utc::now(),
            row_count: 0,
        }
    }

    /// Advances the watermark to `watermark` if it is greater than the current
    /// value, keeping the watermark monotonic.
    pub fn advance_to(&mut self, watermark: Watermark) {
        match &self.last_sync_value {
            Some(current) if *current >= watermark => {}
            _ => self.last_sync_value = Some(watermark),
        }
    }
}

/// Trait for durable storage of one [`Checkpoint`] record per table.
///
/// Implementations must write whole-record replacements, never partial-field
/// merges, so a reader can never observe a watermark and row count from two
/// different runs.
///
/// A missing or unreadable record is not an error: `load` returns `Ok(None)`
/// and the pipeline starts from scratch. Corruption is logged by the
/// implementation.
pub trait CheckpointStore {
    /// Loads the checkpoint for `table_name`.
    ///
    /// Returns `Ok(None)` if no checkpoint exists or the persisted record is
    /// unreadable.
    fn load(
        &self,
        table_name: &str,
    ) -> impl Future<Output = SyncResult<Option<Checkpoint>>> + Send;

    /// Writes the full checkpoint record, replacing any previous one.
    ///
    /// A failed save is reported to the caller; the engine decides whether to
    /// continue with an in-memory checkpoint.
    fn save(&self, checkpoint: &Checkpoint) -> impl Future<Output = SyncResult<()>> + Send;

    /// Removes the checkpoint for `table_name`, if any. This is the only way a
    /// checkpoint is ever deleted.
    fn reset(&self, table_name: &str) -> impl Future<Output = SyncResult<()>> + Send;
}
