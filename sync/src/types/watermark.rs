use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Cell;

/// The incrementing value used to identify "new" source rows relative to the
/// last checkpoint.
///
/// Watermarks are opaque to the pipeline: it only ever compares them and takes
/// per-batch maxima. Timestamp watermarks are carried in their RFC 3339 text
/// form, which compares lexicographically in chronological order for a fixed
/// format.
///
/// Serialized untagged, so the checkpoint layout stores a plain JSON string or
/// number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Watermark {
    Int(i64),
    Text(String),
}

impl Watermark {
    /// Extracts a watermark from a cell value.
    ///
    /// Returns [`None`] for cell types that cannot serve as a watermark
    /// (nulls, booleans, floats, json). Timestamps are rendered into a fixed
    /// RFC 3339 format so that text ordering matches time ordering.
    pub fn from_cell(cell: &Cell) -> Option<Self> {
        match cell {
            Cell::I32(value) => Some(Watermark::Int(i64::from(*value))),
            Cell::I64(value) => Some(Watermark::Int(*value)),
            Cell::String(value) => Some(Watermark::Text(value.clone())),
            Cell::TimestampTz(value) => Some(Watermark::Text(
                value.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            )),
            Cell::Null | Cell::Bool(_) | Cell::F64(_) | Cell::Json(_) => None,
        }
    }
}

impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Watermark {
    /// Watermarks of one table always share a variant; the cross-variant
    /// ordering (`Int` < `Text`) only exists so the type is totally ordered.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Watermark::Int(a), Watermark::Int(b)) => a.cmp(b),
            (Watermark::Text(a), Watermark::Text(b)) => a.cmp(b),
            (Watermark::Int(_), Watermark::Text(_)) => Ordering::Less,
            (Watermark::Text(_), Watermark::Int(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Watermark::Int(value) => write!(f, "{value}"),
            Watermark::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Watermark {
    fn from(value: i64) -> Self {
        Watermark::Int(value)
    }
}

impl From<&str> for Watermark {
    fn from(value: &str) -> Self {
        Watermark::Text(value.to_string())
    }
}
