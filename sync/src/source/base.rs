use std::future::Future;

use crate::error::SyncResult;
use crate::types::{TableRow, TableSchema, Watermark};

/// Trait for transactional sources the pipeline reads from.
///
/// Real connectors (connection management, SQL dialect, type mapping) live
/// outside this workspace; the engine consumes them through this narrow
/// contract only.
///
/// Fetch semantics the engine relies on:
///
/// - Rows are returned in strictly increasing watermark order (primary key
///   order when no watermark column is given), so the per-batch maximum
///   watermark is monotonic across batches.
/// - `since` filters to rows with a watermark strictly greater than the given
///   value.
/// - `offset` is relative to the filtered, ordered result, letting the engine
///   page through rows of equal watermark without re-reading them.
/// - At most `limit` rows are returned; fewer than `limit` rows means end of
///   data.
pub trait SourceConnector {
    /// Opens the connection to the source.
    fn connect(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Closes the connection. Must be called on every exit path of a run.
    fn disconnect(&self) -> impl Future<Output = SyncResult<()>> + Send;

    /// Returns the schema of a source table.
    fn table_schema(
        &self,
        schema: &str,
        table: &str,
    ) -> impl Future<Output = SyncResult<TableSchema>> + Send;

    /// Fetches up to `limit` rows from a source table.
    fn fetch_batch(
        &self,
        schema: &str,
        table: &str,
        watermark_column: Option<&str>,
        since: Option<&Watermark>,
        limit: usize,
        offset: usize,
    ) -> impl Future<Output = SyncResult<Vec<TableRow>>> + Send;
}
