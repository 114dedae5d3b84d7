use thiserror::Error;

/// Errors raised while validating configuration before a sync run is allowed
/// to start.
///
/// Validation happens once, up front, so that a misconfigured table can never
/// partially start a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The source table name is empty.
    #[error("source table name must not be empty")]
    MissingSourceTable,

    /// The destination table name is empty.
    #[error("destination table name must not be empty")]
    MissingDestinationTable,

    /// The primary key column name is empty.
    #[error("primary key column must not be empty")]
    MissingPrimaryKey,

    /// The batch size is outside the allowed bounds.
    #[error("batch size {0} is out of range ({min}..={max})", min = crate::shared::MIN_BATCH_SIZE, max = crate::shared::MAX_BATCH_SIZE)]
    BatchSizeOutOfRange(usize),

    /// The schedule hour is not a valid hour of day.
    #[error("schedule hour {0} is not in 0..=23")]
    InvalidScheduleHour(u32),

    /// The schedule minute is not a valid minute of hour.
    #[error("schedule minute {0} is not in 0..=59")]
    InvalidScheduleMinute(u32),
}
