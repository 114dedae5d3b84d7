use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::bail;
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::types::{Cell, TableRow, TableSchema};

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    /// Rows keyed by a canonical rendering of the primary key cell, so a
    /// re-delivered batch replaces instead of duplicating.
    rows: HashMap<String, TableRow>,
    /// Append-only log of batch sizes, in write order.
    write_log: Vec<usize>,
}

#[derive(Debug)]
struct Inner {
    tables: HashMap<String, MemoryTable>,
    #[cfg(any(test, feature = "test-utils"))]
    fail_on_batch: Option<usize>,
    batches_written: usize,
}

/// In-memory destination for testing and development.
///
/// Performs insert-or-replace by primary key like a real destination adapter
/// would, and keeps a batch-level write log so tests can verify exactly which
/// batches were (re)written.
#[derive(Debug, Clone)]
pub struct MemoryDestination {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDestination {
    /// Creates a new empty memory destination.
    pub fn new() -> Self {
        let inner = Inner {
            tables: HashMap::new(),
            #[cfg(any(test, feature = "test-utils"))]
            fail_on_batch: None,
            batches_written: 0,
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns a copy of all rows of a table, in unspecified order.
    pub async fn rows(&self, table: &str) -> Vec<TableRow> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the batch-level write log of a table (batch sizes in write
    /// order).
    pub async fn write_log(&self, table: &str) -> Vec<usize> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table)
            .map(|t| t.write_log.clone())
            .unwrap_or_default()
    }

    /// Clears all tables and counters.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.tables.clear();
        inner.batches_written = 0;
    }

    /// Makes the n-th `insert_batch` call (1-based, across all tables) fail
    /// before anything is written, to exercise batch failure paths.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn fail_on_batch(&self, nth: usize) {
        let mut inner = self.inner.lock().await;
        inner.fail_on_batch = Some(nth);
    }
}

impl Default for MemoryDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for MemoryDestination {
    async fn table_exists(&self, table: &str) -> SyncResult<bool> {
        let inner = self.inner.lock().await;

        Ok(inner.tables.contains_key(table))
    }

    async fn create_table(&self, schema: &TableSchema) -> SyncResult<()> {
        let mut inner = self.inner.lock().await;

        info!(table = %schema.name, columns = schema.columns.len(), "creating destination table");

        inner.tables.insert(
            schema.name.clone(),
            MemoryTable {
                schema: schema.clone(),
                rows: HashMap::new(),
                write_log: Vec::new(),
            },
        );

        Ok(())
    }

    async fn insert_batch(&self, table: &str, rows: Vec<TableRow>) -> SyncResult<u64> {
        let mut inner = self.inner.lock().await;

        inner.batches_written += 1;

        #[cfg(any(test, feature = "test-utils"))]
        if inner.fail_on_batch == Some(inner.batches_written) {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Batch write failure injected",
                format!("batch {}", inner.batches_written)
            );
        }

        let Some(memory_table) = inner.tables.get_mut(table) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Destination table does not exist",
                table
            );
        };

        let Some(pk_index) = memory_table.schema.primary_key_index() else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Destination table has no primary key column",
                table
            );
        };

        let written = rows.len();
        for row in rows {
            let Some(key_cell) = row.values().get(pk_index) else {
                bail!(
                    ErrorKind::InvalidData,
                    "Row is missing its primary key cell",
                    format!("table '{table}'")
                );
            };

            memory_table.rows.insert(primary_key_of(key_cell), row);
        }
        memory_table.write_log.push(written);

        info!(table, rows = written, "wrote batch to memory destination");

        Ok(written as u64)
    }

    async fn row_count(&self, table: &str) -> SyncResult<u64> {
        let inner = self.inner.lock().await;

        let Some(memory_table) = inner.tables.get(table) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Destination table does not exist",
                table
            );
        };

        Ok(memory_table.rows.len() as u64)
    }
}

/// Renders a primary key cell into the canonical form used as the row key.
fn primary_key_of(cell: &Cell) -> String {
    match cell {
        Cell::Null => "null".to_string(),
        Cell::Bool(value) => value.to_string(),
        Cell::I32(value) => value.to_string(),
        Cell::I64(value) => value.to_string(),
        Cell::F64(value) => value.to_string(),
        Cell::String(value) => value.clone(),
        Cell::TimestampTz(value) => value.to_rfc3339(),
        Cell::Json(value) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ColumnSchema, ColumnType};

    fn schema() -> TableSchema {
        TableSchema::new(
            "orders",
            vec![
                ColumnSchema::new("id", ColumnType::BigInt, false),
                ColumnSchema::new("note", ColumnType::Text, true),
            ],
            "id",
        )
    }

    fn row(id: i64, note: &str) -> TableRow {
        TableRow::new(vec![Cell::I64(id), Cell::String(note.to_string())])
    }

    #[tokio::test]
    async fn reinsertion_replaces_by_primary_key() {
        let destination = MemoryDestination::new();
        destination.create_table(&schema()).await.unwrap();

        destination
            .insert_batch("orders", vec![row(1, "a"), row(2, "b")])
            .await
            .unwrap();
        destination
            .insert_batch("orders", vec![row(2, "b2"), row(3, "c")])
            .await
            .unwrap();

        assert_eq!(destination.row_count("orders").await.unwrap(), 3);

        let mut notes: Vec<String> = destination
            .rows("orders")
            .await
            .into_iter()
            .map(|row| match &row.values()[1] {
                Cell::String(note) => note.clone(),
                other => panic!("unexpected cell {other:?}"),
            })
            .collect();
        notes.sort();
        assert_eq!(notes, vec!["a", "b2", "c"]);
    }

    #[tokio::test]
    async fn write_log_records_batches_in_order() {
        let destination = MemoryDestination::new();
        destination.create_table(&schema()).await.unwrap();

        destination
            .insert_batch("orders", vec![row(1, "a")])
            .await
            .unwrap();
        destination
            .insert_batch("orders", vec![row(2, "b"), row(3, "c")])
            .await
            .unwrap();

        assert_eq!(destination.write_log("orders").await, vec![1, 2]);
    }

    #[tokio::test]
    async fn insert_into_missing_table_fails() {
        let destination = MemoryDestination::new();
        let err = destination
            .insert_batch("missing", vec![row(1, "a")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);
    }
}
