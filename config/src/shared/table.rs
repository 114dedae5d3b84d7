use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Smallest batch size a table is allowed to configure.
pub const MIN_BATCH_SIZE: usize = 1;

/// Largest batch size a table is allowed to configure.
///
/// Memory usage during a run is bounded by one batch of rows, so this cap is
/// also the memory bound of the pipeline.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Default number of rows transferred per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Static definition of one replication target.
///
/// A [`TableConfig`] is loaded once per run and is immutable while the run is
/// in flight. The watermark column is optional: tables without one can only be
/// synced in full mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TableConfig {
    /// Schema of the source table.
    pub source_schema: String,
    /// Name of the source table.
    pub source_table: String,
    /// Name of the destination table.
    pub destination_table: String,
    /// Primary key column, used for idempotent upserts at the destination.
    pub primary_key: String,
    /// Column used to identify new rows in incremental mode.
    #[serde(default)]
    pub watermark_column: Option<String>,
    /// Whether scheduled syncs are enabled for this table.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Number of rows transferred and committed per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_enabled() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl TableConfig {
    /// Validates the [`TableConfig`].
    ///
    /// Returns the first [`ValidationError`] encountered. Callers are expected
    /// to run this before opening any connection, so invalid configuration can
    /// never partially start a run.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.source_table.trim().is_empty() {
            return Err(ValidationError::MissingSourceTable);
        }

        if self.destination_table.trim().is_empty() {
            return Err(ValidationError::MissingDestinationTable);
        }

        if self.primary_key.trim().is_empty() {
            return Err(ValidationError::MissingPrimaryKey);
        }

        if !(MIN_BATCH_SIZE..=MAX_BATCH_SIZE).contains(&self.batch_size) {
            return Err(ValidationError::BatchSizeOutOfRange(self.batch_size));
        }

        Ok(())
    }

    /// Returns the schema-qualified name of the source table.
    pub fn source_qualified_name(&self) -> String {
        format!("{}.{}", self.source_schema, self.source_table)
    }
}
