//! Shared helpers for pipeline tests.

use config::shared::TableConfig;

use crate::types::{Cell, ColumnSchema, ColumnType, TableRow, TableSchema};

/// Schema of the `orders` table used throughout the tests: a bigint primary
/// key, an incrementing bigint watermark, and a text payload.
pub fn orders_schema() -> TableSchema {
    TableSchema::new(
        "orders",
        vec![
            ColumnSchema::new("id", ColumnType::BigInt, false),
            ColumnSchema::new("version", ColumnType::BigInt, false),
            ColumnSchema::new("note", ColumnType::Text, true),
        ],
        "id",
    )
}

/// One `orders` row. The watermark column (`version`) is passed explicitly so
/// tests can model updates arriving out of key order.
pub fn orders_row(id: i64, version: i64, note: &str) -> TableRow {
    TableRow::new(vec![
        Cell::I64(id),
        Cell::I64(version),
        Cell::String(note.to_string()),
    ])
}

/// `n` orders rows with `id == version == 1..=n`.
pub fn orders_rows(n: i64) -> Vec<TableRow> {
    (1..=n).map(|i| orders_row(i, i, "note")).collect()
}

/// Replication config for the `orders` table with the given batch size.
pub fn orders_config(batch_size: usize) -> TableConfig {
    TableConfig {
        source_schema: "public".to_string(),
        source_table: "orders".to_string(),
        destination_table: "orders".to_string(),
        primary_key: "id".to_string(),
        watermark_column: Some("version".to_string()),
        enabled: true,
        batch_size,
    }
}