use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::source::SourceConnector;
use crate::types::{TableRow, TableSchema, Watermark};

#[derive(Debug)]
struct Inner {
    schema: TableSchema,
    rows: Vec<TableRow>,
    connected: bool,
    fetches: usize,
    #[cfg(any(test, feature = "test-utils"))]
    fail_on_fetch: Option<usize>,
}

/// In-memory source connector for testing and development.
///
/// Holds the rows of a single source table. Fetches honor the ordering,
/// `since`, `limit`, and `offset` semantics of the [`SourceConnector`]
/// contract, so the engine behaves exactly as it would against a real
/// connector.
#[derive(Debug, Clone)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySource {
    /// Creates a memory source holding `rows` of the table described by
    /// `schema`.
    pub fn new(schema: TableSchema, rows: Vec<TableRow>) -> Self {
        let inner = Inner {
            schema,
            rows,
            connected: false,
            fetches: 0,
            #[cfg(any(test, feature = "test-utils"))]
            fail_on_fetch: None,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Appends rows to the source table, e.g. between two incremental runs.
    pub async fn push_rows(&self, rows: Vec<TableRow>) {
        let mut inner = self.inner.lock().await;
        inner.rows.extend(rows);
    }

    /// Returns how many fetches have been served.
    pub async fn fetches(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.fetches
    }

    /// Makes the n-th fetch (1-based) of this source fail, to exercise
    /// connectivity failure paths.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn fail_on_fetch(&self, nth: usize) {
        let mut inner = self.inner.lock().await;
        inner.fail_on_fetch = Some(nth);
    }
}

impl SourceConnector for MemorySource {
    async fn connect(&self) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.connected = true;

        Ok(())
    }

    async fn disconnect(&self) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;
        inner.connected = false;

        Ok(())
    }

    async fn table_schema(&self, schema: &str, table: &str) -> SyncResult<TableSchema> {
        let inner = self.inner.lock().await;

        if !inner.connected {
            bail!(ErrorKind::SourceConnectionFailed, "Source is not connected");
        }

        if inner.schema.name != table {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Unknown source table",
                format!("{schema}.{table}")
            );
        }

        Ok(inner.schema.clone())
    }

    async fn fetch_batch(
        &self,
        schema: &str,
        table: &str,
        watermark_column: Option<&str>,
        since: Option<&Watermark>,
        limit: usize,
        offset: usize,
    ) -> SyncResult<Vec<TableRow>> {
        let mut inner = self.inner.lock().await;

        if !inner.connected {
            bail!(ErrorKind::SourceConnectionFailed, "Source is not connected");
        }

        if inner.schema.name != table {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Unknown source table",
                format!("{schema}.{table}")
            );
        }

        inner.fetches += 1;

        #[cfg(any(test, feature = "test-utils"))]
        if inner.fail_on_fetch == Some(inner.fetches) {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Fetch failure injected",
                format!("fetch {}", inner.fetches)
            );
        }

        let order_column = match watermark_column {
            Some(column) => column,
            None => inner.schema.primary_key.as_str(),
        };
        let Some(order_index) = inner.schema.column_index(order_column) else {
            bail!(
                ErrorKind::SourceQueryFailed,
                "Order column not in source schema",
                order_column
            );
        };

        // A row whose order cell cannot be ordered would otherwise vanish
        // from every fetch; that is data loss, so the fetch fails instead.
        let mut selected: Vec<(Watermark, TableRow)> = Vec::new();
        for row in &inner.rows {
            let Some(cell) = row.values().get(order_index) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Row is missing its order column cell",
                    order_column
                );
            };
            let Some(watermark) = Watermark::from_cell(cell) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Order column cell is not an orderable value",
                    format!("column '{order_column}': cell is {}", cell.variant_name())
                );
            };

            if let Some(since) = since
                && watermark <= *since
            {
                continue;
            }
            selected.push((watermark, row.clone()));
        }

        // Stable sort keeps insertion order for rows of equal watermark, which
        // makes offset paging deterministic.
        selected.sort_by(|(a, _), (b, _)| a.cmp(b));

        let batch: Vec<TableRow> = selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, row)| row)
            .collect();

        info!(
            table,
            limit,
            offset,
            returned = batch.len(),
            "served batch from memory source"
        );

        Ok(batch)
    }
}
