use serde::{Deserialize, Serialize};

use crate::shared::{ScheduleConfig, TableConfig, ValidationError};

/// Destination kind the replicator service wires at startup.
///
/// Real destination adapters live outside this workspace and are consumed
/// through the destination contract; the memory kind exists for development
/// and testing of the pipeline itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationConfig {
    /// In-memory destination, useful for local runs and tests.
    Memory,
}

/// Top-level configuration of the replicator service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReplicatorConfig {
    /// Replication targets. Disabled tables are kept in the file but skipped
    /// when jobs are registered.
    pub tables: Vec<TableConfig>,
    /// Daily trigger for the scheduled sync job.
    pub schedule: ScheduleConfig,
    /// Destination kind to wire.
    pub destination: DestinationConfig,
    /// Directory holding one checkpoint file per destination table.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: String,
}

fn default_checkpoint_dir() -> String {
    ".checkpoints".to_string()
}

impl ReplicatorConfig {
    /// Validates the whole replicator configuration.
    ///
    /// Every table is validated, including disabled ones, so a broken entry is
    /// caught at startup rather than on the day it is re-enabled.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for table in &self.tables {
            table.validate()?;
        }

        self.schedule.validate()
    }
}
