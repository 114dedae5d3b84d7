//! Fixed source-to-destination column type mapping.
//!
//! The pipeline copies rows, it does not transform them: every source column
//! type maps to exactly one destination type. Integers widen to 64 bits and
//! json is carried as its serialized text, which is what an embedded
//! analytical store ingests most cheaply.

use crate::bail;
use crate::error::{ErrorKind, SyncResult};
use crate::types::{Cell, ColumnSchema, ColumnType, TableRow, TableSchema};

/// Returns the destination column type for a source column type.
pub fn destination_type(source: ColumnType) -> ColumnType {
    match source {
        ColumnType::Boolean => ColumnType::Boolean,
        ColumnType::Integer | ColumnType::BigInt => ColumnType::BigInt,
        ColumnType::Double => ColumnType::Double,
        ColumnType::Text => ColumnType::Text,
        ColumnType::TimestampTz => ColumnType::TimestampTz,
        ColumnType::Json => ColumnType::Text,
    }
}

/// Maps a source table schema to the schema of its destination copy.
pub fn destination_schema(destination_table: &str, source: &TableSchema) -> TableSchema {
    let columns = source
        .columns
        .iter()
        .map(|column| {
            ColumnSchema::new(
                column.name.clone(),
                destination_type(column.column_type),
                column.nullable,
            )
        })
        .collect();

    TableSchema::new(destination_table, columns, source.primary_key.clone())
}

/// Converts one row from source cells to destination cells.
///
/// `context` names the batch for error detail; the failing column is added
/// here.
pub fn convert_row(source: &TableSchema, row: TableRow, context: &str) -> SyncResult<TableRow> {
    if row.values().len() != source.columns.len() {
        bail!(
            ErrorKind::InvalidData,
            "Row width does not match source schema",
            format!(
                "{context}: expected {} cells, got {}",
                source.columns.len(),
                row.values().len()
            )
        );
    }

    let mut converted = Vec::with_capacity(row.values().len());
    for (column, cell) in source.columns.iter().zip(row.into_values()) {
        converted.push(convert_cell(column, cell, context)?);
    }

    Ok(TableRow::new(converted))
}

/// Converts a single cell according to the fixed mapping.
fn convert_cell(column: &ColumnSchema, cell: Cell, context: &str) -> SyncResult<Cell> {
    let converted = match (column.column_type, cell) {
        (_, Cell::Null) => {
            if !column.nullable {
                bail!(
                    ErrorKind::InvalidData,
                    "Null in non-nullable column",
                    format!("{context}: column '{}'", column.name)
                );
            }
            Cell::Null
        }
        (ColumnType::Boolean, Cell::Bool(value)) => Cell::Bool(value),
        (ColumnType::Integer, Cell::I32(value)) => Cell::I64(i64::from(value)),
        (ColumnType::BigInt, Cell::I64(value)) => Cell::I64(value),
        (ColumnType::BigInt, Cell::I32(value)) => Cell::I64(i64::from(value)),
        (ColumnType::Double, Cell::F64(value)) => Cell::F64(value),
        (ColumnType::Text, Cell::String(value)) => Cell::String(value),
        (ColumnType::TimestampTz, Cell::TimestampTz(value)) => Cell::TimestampTz(value),
        (ColumnType::Json, Cell::Json(value)) => Cell::String(value.to_string()),
        (expected, cell) => {
            bail!(
                ErrorKind::ConversionError,
                "Cell does not match column type",
                format!(
                    "{context}: column '{}' is {:?}, cell is {}",
                    column.name,
                    expected,
                    cell.variant_name()
                )
            );
        }
    };

    Ok(converted)
}
