use std::sync::Arc;

use anyhow::Context;
use config::shared::{DestinationConfig, ReplicatorConfig, TableConfig};
use sync::checkpoint::FsCheckpointStore;
use sync::concurrency::run_lock::RunLock;
use sync::destination::{Destination, MemoryDestination};
use sync::engine::SyncEngine;
use sync::run_log::MemoryRunLog;
use sync::scheduler::{DailySchedule, Scheduler, guarded, job};
use sync::source::MemorySource;
use sync::types::{ColumnSchema, ColumnType, TableSchema};
use tracing::{info, warn};

/// Starts the replicator service with the provided configuration.
///
/// Creates the destination named by the configuration, registers one guarded
/// daily sync job per enabled table, and runs until a shutdown signal arrives.
pub async fn start_replicator_with_config(config: ReplicatorConfig) -> anyhow::Result<()> {
    info!(
        tables = config.tables.len(),
        checkpoint_dir = %config.checkpoint_dir,
        "starting replicator service"
    );

    // Dispatch is static per destination kind.
    match &config.destination {
        DestinationConfig::Memory => run_replicator(&config, MemoryDestination::new()).await,
    }
}

async fn run_replicator<D>(config: &ReplicatorConfig, destination: D) -> anyhow::Result<()>
where
    D: Destination + Clone + Send + Sync + 'static,
{
    let schedule = DailySchedule::try_from(&config.schedule)
        .context("invalid daily schedule in configuration")?;

    let lock = RunLock::new();
    let mut scheduler = Scheduler::new();

    for table in config.tables.iter() {
        if !table.enabled {
            info!(table = %table.source_qualified_name(), "table disabled, no job registered");
            continue;
        }

        let engine = Arc::new(SyncEngine::new(
            MemorySource::new(source_schema_for(table), Vec::new()),
            destination.clone(),
            FsCheckpointStore::new(&config.checkpoint_dir),
            MemoryRunLog::new(),
        ));

        let table_config = table.clone();
        let body = job(move || {
            let engine = engine.clone();
            let table_config = table_config.clone();

            async move {
                match engine.incremental_sync(&table_config, None).await {
                    Ok(summary) => info!(
                        table = %table_config.destination_table,
                        rows = summary.rows_synced,
                        batches = summary.batches,
                        status = %summary.status,
                        checkpoint_durable = summary.checkpoint_durable,
                        "scheduled sync finished"
                    ),
                    Err(err) => warn!(
                        table = %table_config.destination_table,
                        error = %err,
                        "scheduled sync failed"
                    ),
                }
            }
        });

        scheduler.add_job(
            table.destination_table.clone(),
            schedule,
            guarded(&lock, &table.destination_table, body),
        );
    }

    scheduler.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;

    info!("shutdown signal received, stopping scheduler");
    scheduler.stop().await;

    Ok(())
}

/// Derives the source schema the memory source serves for a table.
///
/// The memory destination kind exists for development runs; the source shape
/// is the minimal one the configuration names, a big integer primary key plus
/// the watermark column when one is configured.
fn source_schema_for(table: &TableConfig) -> TableSchema {
    let mut columns = vec![ColumnSchema::new(&table.primary_key, ColumnType::BigInt, false)];
    if let Some(watermark_column) = &table.watermark_column
        && *watermark_column != table.primary_key
    {
        columns.push(ColumnSchema::new(watermark_column, ColumnType::BigInt, false));
    }

    TableSchema::new(&table.source_table, columns, &table.primary_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(watermark_column: Option<&str>) -> TableConfig {
        TableConfig {
            source_schema: "public".to_string(),
            source_table: "orders".to_string(),
            destination_table: "orders".to_string(),
            primary_key: "id".to_string(),
            watermark_column: watermark_column.map(str::to_string),
            enabled: true,
            batch_size: 100,
        }
    }

    #[test]
    fn derived_schema_includes_the_watermark_column() {
        let schema = source_schema_for(&table(Some("version")));

        assert_eq!(schema.name, "orders");
        assert_eq!(schema.primary_key, "id");
        assert_eq!(schema.column_index("version"), Some(1));
    }

    #[test]
    fn watermark_on_the_primary_key_is_not_duplicated() {
        let schema = source_schema_for(&table(Some("id")));

        assert_eq!(schema.columns.len(), 1);
    }
}
