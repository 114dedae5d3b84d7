//! The sync engine: orchestrates full and incremental transfers.
//!
//! The engine owns one invocation end to end: it validates configuration
//! before opening any connection, pulls bounded batches from the source,
//! writes them through the destination, and advances the checkpoint only after
//! each batch write is durable. A crash between a batch write and the
//! checkpoint advance is safe to re-run because the destination upserts by
//! primary key.

use std::time::Instant;

use chrono::Utc;
use config::shared::TableConfig;
use tracing::{info, warn};

use crate::bail;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::concurrency::run_control::{
    ControlState, RunControl, RunControlRx, create_run_control,
};
use crate::conversions;
use crate::destination::Destination;
use crate::error::{ErrorKind, SyncResult};
use crate::run_log::RunLog;
use crate::source::SourceConnector;
use crate::types::{RunRecord, RunStatus, RunSummary, RunType, TableSchema, Watermark};

/// Result of the shared batch loop.
struct BatchOutcome {
    batches: u64,
    status: RunStatus,
    checkpoint_durable: bool,
}

/// Orchestrates sync runs against one source and one destination.
///
/// The checkpoint store and the run lock (held by the caller) are the only
/// state shared across invocations; the source and destination connections are
/// exclusively owned by the invocation that opened them and are closed on
/// every exit path.
#[derive(Debug)]
pub struct SyncEngine<S, D, C, L> {
    source: S,
    destination: D,
    checkpoints: C,
    run_log: L,
    control: RunControl,
}

impl<S, D, C, L> SyncEngine<S, D, C, L>
where
    S: SourceConnector + Send + Sync,
    D: Destination + Send + Sync,
    C: CheckpointStore + Send + Sync,
    L: RunLog + Send + Sync,
{
    pub fn new(source: S, destination: D, checkpoints: C, run_log: L) -> Self {
        let (control, _) = create_run_control();

        Self {
            source,
            destination,
            checkpoints,
            run_log,
            control,
        }
    }

    /// Returns a handle for pausing, resuming, or stopping in-flight runs of
    /// this engine. Stop and pause are cooperative: they take effect at the
    /// next batch boundary.
    pub fn control(&self) -> RunControl {
        self.control.clone()
    }

    /// Transfers the entire source table, regardless of any watermark.
    ///
    /// Creates the destination table if absent. The checkpoint's row count is
    /// replaced with this run's total; a watermark, if one exists from earlier
    /// incremental runs, is left untouched.
    pub async fn full_sync(&self, config: &TableConfig) -> SyncResult<RunSummary> {
        self.execute(config, RunType::Full, None).await
    }

    /// Transfers rows with a watermark strictly greater than the checkpoint.
    ///
    /// When no checkpoint exists yet, `initial` bounds the transfer instead;
    /// with neither, the whole table qualifies.
    pub async fn incremental_sync(
        &self,
        config: &TableConfig,
        initial: Option<Watermark>,
    ) -> SyncResult<RunSummary> {
        self.execute(config, RunType::Incremental, initial).await
    }

    /// Runs the shared batch loop without persisting any checkpoint.
    ///
    /// Useful to verify connectivity and the type mapping of a table before
    /// enabling it. Returns the total number of rows transferred.
    pub async fn sync_in_batches(&self, config: &TableConfig) -> SyncResult<u64> {
        let summary = self.execute(config, RunType::Test, None).await?;

        Ok(summary.rows_synced)
    }

    async fn execute(
        &self,
        config: &TableConfig,
        run_type: RunType,
        initial: Option<Watermark>,
    ) -> SyncResult<RunSummary> {
        // Fail fast, before any connection is opened or any record written.
        if let Err(err) = config.validate() {
            bail!(
                ErrorKind::ConfigError,
                "Invalid table configuration",
                err.to_string(),
                source: err
            );
        }

        if run_type == RunType::Incremental && config.watermark_column.is_none() {
            bail!(
                ErrorKind::ConfigError,
                "Incremental sync requires a watermark column",
                config.source_qualified_name()
            );
        }

        // Control requests apply to the in-flight run only. A new run always
        // starts in the running state, so a stop that ended a previous run
        // cannot leak into this one.
        self.control.resume();

        let mut record = RunRecord::new(&config.destination_table, run_type);
        self.log_run(&record).await;

        info!(
            run_id = %record.run_id,
            table = %config.source_qualified_name(),
            run_type = %run_type,
            "starting sync run"
        );

        let started = Instant::now();

        if let Err(err) = self.source.connect().await {
            self.finalize_failed(&mut record, &err).await;
            return Err(err);
        }

        let result = self
            .run_table(config, run_type, initial, &mut record)
            .await;

        // The connection is owned by this invocation; close it on the failure
        // path as well.
        if let Err(err) = self.source.disconnect().await {
            warn!(table = %config.source_qualified_name(), error = %err, "source disconnect failed");
        }

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                self.finalize_failed(&mut record, &err).await;
                return Err(err);
            }
        };

        match outcome.status {
            RunStatus::Stopped => record.stop(record.total_rows)?,
            _ => record.complete(record.total_rows)?,
        }
        self.log_run(&record).await;

        let summary = RunSummary {
            rows_synced: record.total_rows,
            batches: outcome.batches,
            elapsed: started.elapsed(),
            status: record.status,
            checkpoint_durable: outcome.checkpoint_durable,
        };

        info!(
            run_id = %record.run_id,
            rows = summary.rows_synced,
            batches = summary.batches,
            rows_per_second = summary.rows_per_second().unwrap_or(0.0),
            status = %summary.status,
            checkpoint_durable = summary.checkpoint_durable,
            "sync run finished"
        );

        Ok(summary)
    }

    async fn run_table(
        &self,
        config: &TableConfig,
        run_type: RunType,
        initial: Option<Watermark>,
        record: &mut RunRecord,
    ) -> SyncResult<BatchOutcome> {
        let source_schema = self
            .source
            .table_schema(&config.source_schema, &config.source_table)
            .await?;

        let watermark_column = match run_type {
            RunType::Incremental => config.watermark_column.as_deref(),
            RunType::Full | RunType::Test => None,
        };
        let watermark_index = match watermark_column {
            Some(column) => match source_schema.column_index(column) {
                Some(index) => Some(index),
                None => bail!(
                    ErrorKind::ConfigError,
                    "Watermark column not in source schema",
                    format!("{}: '{column}'", config.source_qualified_name())
                ),
            },
            None => None,
        };

        self.ensure_destination_table(config, &source_schema).await?;

        let mut checkpoint = self
            .checkpoints
            .load(&config.destination_table)
            .await?
            .unwrap_or_else(|| Checkpoint::new(&config.destination_table));

        let since = match run_type {
            RunType::Incremental => checkpoint.last_sync_value.clone().or(initial),
            RunType::Full | RunType::Test => None,
        };

        // `since` stays fixed for the whole run; paging within the run uses the
        // offset cursor so rows of equal watermark are neither skipped nor
        // fetched twice.
        let mut rx = self.control.subscribe();
        let mut offset = 0usize;
        let mut batches = 0u64;
        let mut checkpoint_durable = true;

        loop {
            if self.observe_control(&mut rx, record).await? == ControlState::Stop {
                info!(
                    run_id = %record.run_id,
                    rows = record.total_rows,
                    "stop requested, honoring it at the batch boundary"
                );
                return Ok(BatchOutcome {
                    batches,
                    status: RunStatus::Stopped,
                    checkpoint_durable,
                });
            }

            let rows = self
                .source
                .fetch_batch(
                    &config.source_schema,
                    &config.source_table,
                    watermark_column,
                    since.as_ref(),
                    config.batch_size,
                    offset,
                )
                .await?;
            let fetched = rows.len();
            if fetched == 0 {
                break;
            }

            batches += 1;
            let context = format!(
                "table '{}', batch {batches}",
                config.source_qualified_name()
            );

            // The batch maximum is taken from the source rows before
            // conversion; batches arrive in increasing watermark order, so
            // this maximum is monotonic across batches.
            let batch_watermark = match watermark_index {
                Some(index) => Some(batch_max_watermark(&rows, index, &context)?),
                None => None,
            };

            let mut converted = Vec::with_capacity(fetched);
            for row in rows {
                converted.push(conversions::convert_row(&source_schema, row, &context)?);
            }

            let written = self
                .destination
                .insert_batch(&config.destination_table, converted)
                .await?;
            record.total_rows += written;

            // The write above is durable; only now may the checkpoint move.
            // `row_count` carries the statistics of the last run that advanced
            // this checkpoint, not a lifetime total.
            match run_type {
                RunType::Full | RunType::Incremental => {
                    checkpoint.row_count = record.total_rows
                }
                RunType::Test => {}
            }
            if let Some(watermark) = batch_watermark {
                checkpoint.advance_to(watermark);
            }
            checkpoint.last_sync_time = Utc::now();

            if run_type != RunType::Test
                && let Err(err) = self.checkpoints.save(&checkpoint).await
            {
                // Durability was not achieved; the run proceeds with the
                // in-memory checkpoint and the summary carries the warning.
                warn!(
                    run_id = %record.run_id,
                    table = %config.destination_table,
                    error = %err,
                    "checkpoint save failed, continuing with in-memory checkpoint"
                );
                checkpoint_durable = false;
            }

            offset += fetched;
            if fetched < config.batch_size {
                break;
            }
        }

        Ok(BatchOutcome {
            batches,
            status: RunStatus::Completed,
            checkpoint_durable,
        })
    }

    async fn ensure_destination_table(
        &self,
        config: &TableConfig,
        source_schema: &TableSchema,
    ) -> SyncResult<()> {
        if self
            .destination
            .table_exists(&config.destination_table)
            .await?
        {
            return Ok(());
        }

        let destination_schema =
            conversions::destination_schema(&config.destination_table, source_schema);
        self.destination.create_table(&destination_schema).await
    }

    /// Observes the control channel at a batch boundary.
    ///
    /// A pause parks here, appending the Paused and resumed-Running records,
    /// until an explicit resume or stop. Returns the state the loop should act
    /// on: `Run` or `Stop`.
    async fn observe_control(
        &self,
        rx: &mut RunControlRx,
        record: &mut RunRecord,
    ) -> SyncResult<ControlState> {
        let state = *rx.borrow_and_update();
        match state {
            ControlState::Run => Ok(ControlState::Run),
            ControlState::Stop => Ok(ControlState::Stop),
            ControlState::Pause => {
                info!(run_id = %record.run_id, "pause requested, parking at batch boundary");
                record.transition_to(RunStatus::Paused)?;
                self.log_run(record).await;

                let next = loop {
                    // A dropped controller can never resume the run; treat it
                    // as a resume rather than parking forever.
                    if rx.changed().await.is_err() {
                        break ControlState::Run;
                    }

                    let next = *rx.borrow_and_update();
                    if next != ControlState::Pause {
                        break next;
                    }
                };

                if next == ControlState::Stop {
                    return Ok(ControlState::Stop);
                }

                info!(run_id = %record.run_id, "resumed");
                record.transition_to(RunStatus::Running)?;
                self.log_run(record).await;

                Ok(ControlState::Run)
            }
        }
    }

    async fn finalize_failed(&self, record: &mut RunRecord, err: &crate::error::SyncError) {
        let rows = record.total_rows;
        if let Err(log_err) = record.fail(err, rows) {
            warn!(run_id = %record.run_id, error = %log_err, "could not mark run failed");
        }
        self.log_run(record).await;
    }

    /// The run log is advisory; a failed append is logged, never fatal.
    async fn log_run(&self, record: &RunRecord) {
        if let Err(err) = self.run_log.append(record).await {
            warn!(run_id = %record.run_id, error = %err, "run log append failed");
        }
    }
}

/// Returns the maximum watermark of a batch.
fn batch_max_watermark(
    rows: &[crate::types::TableRow],
    watermark_index: usize,
    context: &str,
) -> SyncResult<Watermark> {
    let mut max: Option<Watermark> = None;
    for row in rows {
        let Some(cell) = row.values().get(watermark_index) else {
            bail!(
                ErrorKind::InvalidData,
                "Row is missing its watermark cell",
                context
            );
        };

        let Some(watermark) = Watermark::from_cell(cell) else {
            bail!(
                ErrorKind::InvalidData,
                "Watermark cell is not an orderable value",
                format!("{context}: cell is {}", cell.variant_name())
            );
        };

        max = Some(match max {
            Some(current) if current >= watermark => current,
            _ => watermark,
        });
    }

    // Callers only ask for a maximum of non-empty batches.
    match max {
        Some(max) => Ok(max),
        None => bail!(ErrorKind::InvalidData, "Empty batch has no watermark", context),
    }
}
