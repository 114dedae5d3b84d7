use std::future::Future;

use crate::error::SyncResult;
use crate::types::{TableRow, TableSchema};

/// Trait for analytical stores that receive replicated data.
///
/// Implementations must make `insert_batch` idempotent on the primary key:
/// re-insertion of a previously-written key is an insert-or-replace, never a
/// fatal duplicate error. The engine relies on this for crash safety — after a
/// crash between a batch write and the checkpoint advance, the last batch is
/// re-delivered on the next run and must land as a no-op.
pub trait Destination {
    /// Returns whether the named table exists at the destination.
    fn table_exists(&self, table: &str) -> impl Future<Output = SyncResult<bool>> + Send;

    /// Creates a table from the given (already destination-mapped) schema.
    fn create_table(&self, schema: &TableSchema) -> impl Future<Output = SyncResult<()>> + Send;

    /// Writes a batch of rows, replacing rows whose primary key already
    /// exists. Returns the number of rows written.
    ///
    /// The write must be durable when this future resolves successfully; the
    /// engine advances the checkpoint immediately afterwards.
    fn insert_batch(
        &self,
        table: &str,
        rows: Vec<TableRow>,
    ) -> impl Future<Output = SyncResult<u64>> + Send;

    /// Returns the number of rows currently in the named table.
    fn row_count(&self, table: &str) -> impl Future<Output = SyncResult<u64>> + Send;
}
