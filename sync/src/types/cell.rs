use chrono::{DateTime, Utc};

/// A single typed column value.
///
/// The pipeline copies rows through a fixed type mapping, so the set of cell
/// variants is closed and intentionally small.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    I32(i32),
    I64(i64),
    F64(f64),
    String(String),
    TimestampTz(DateTime<Utc>),
    Json(serde_json::Value),
}

impl Cell {
    /// Returns a short name for the variant, used in conversion error detail.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::I32(_) => "i32",
            Cell::I64(_) => "i64",
            Cell::F64(_) => "f64",
            Cell::String(_) => "string",
            Cell::TimestampTz(_) => "timestamptz",
            Cell::Json(_) => "json",
        }
    }
}
