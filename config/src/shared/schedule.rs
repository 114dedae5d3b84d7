use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Time-of-day trigger for the default scheduled sync job.
///
/// The scheduler fires once per day at `hour:minute` UTC. Finer granularity is
/// intentionally not supported; this pipeline targets reporting workloads that
/// need a recent copy, not a continuous stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScheduleConfig {
    /// Hour of day (UTC) at which the job fires.
    pub hour: u32,
    /// Minute of hour at which the job fires.
    pub minute: u32,
}

impl ScheduleConfig {
    /// Validates the [`ScheduleConfig`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hour > 23 {
            return Err(ValidationError::InvalidScheduleHour(self.hour));
        }

        if self.minute > 59 {
            return Err(ValidationError::InvalidScheduleMinute(self.minute));
        }

        Ok(())
    }
}
