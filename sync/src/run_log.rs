//! Append-only log of run records.
//!
//! The engine writes one record when a run starts and one for every status
//! transition after that. It never reads the log back; historical run metadata
//! is for operators, not for the pipeline's own decisions.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::SyncResult;
use crate::types::RunRecord;

/// Trait for append-only persistence of [`RunRecord`]s.
pub trait RunLog {
    /// Appends a snapshot of the record. Each status transition of a run
    /// appends a new entry; entries are never updated in place.
    fn append(&self, record: &RunRecord) -> impl Future<Output = SyncResult<()>> + Send;
}

/// In-memory run log for testing and development.
#[derive(Debug, Clone, Default)]
pub struct MemoryRunLog {
    records: Arc<Mutex<Vec<RunRecord>>>,
}

impl MemoryRunLog {
    /// Creates a new empty run log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all appended records in append order.
    pub async fn records(&self) -> Vec<RunRecord> {
        let records = self.records.lock().await;
        records.clone()
    }
}

impl RunLog for MemoryRunLog {
    async fn append(&self, record: &RunRecord) -> SyncResult<()> {
        let mut records = self.records.lock().await;
        records.push(record.clone());

        Ok(())
    }
}
