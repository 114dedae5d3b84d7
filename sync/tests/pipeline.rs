//! End-to-end pipeline tests against the in-memory adapters.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sync::checkpoint::{CheckpointStore, MemoryCheckpointStore};
use sync::concurrency::run_control::RunControl;
use sync::destination::{Destination, MemoryDestination};
use sync::engine::SyncEngine;
use sync::error::{ErrorKind, SyncResult};
use sync::run_log::MemoryRunLog;
use sync::source::MemorySource;
use sync::test_utils::{orders_config, orders_row, orders_rows, orders_schema};
use sync::types::{RunStatus, RunType, TableRow, TableSchema, Watermark};

fn engine_for(
    rows: Vec<TableRow>,
) -> (
    SyncEngine<MemorySource, MemoryDestination, MemoryCheckpointStore, MemoryRunLog>,
    MemorySource,
    MemoryDestination,
    MemoryCheckpointStore,
    MemoryRunLog,
) {
    let source = MemorySource::new(orders_schema(), rows);
    let destination = MemoryDestination::new();
    let checkpoints = MemoryCheckpointStore::new();
    let run_log = MemoryRunLog::new();

    let engine = SyncEngine::new(
        source.clone(),
        destination.clone(),
        checkpoints.clone(),
        run_log.clone(),
    );

    (engine, source, destination, checkpoints, run_log)
}

#[tokio::test]
async fn full_sync_transfers_every_row() {
    let (engine, _source, destination, checkpoints, run_log) = engine_for(orders_rows(25));

    let summary = engine.full_sync(&orders_config(10)).await.unwrap();

    assert_eq!(summary.rows_synced, 25);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.status, RunStatus::Completed);
    assert!(summary.checkpoint_durable);
    assert_eq!(destination.row_count("orders").await.unwrap(), 25);

    let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(checkpoint.row_count, 25);
    // Full sync does not touch the watermark.
    assert_eq!(checkpoint.last_sync_value, None);

    let records = run_log.records().await;
    assert_eq!(records.first().unwrap().status, RunStatus::Running);
    assert_eq!(records.last().unwrap().status, RunStatus::Completed);
    assert_eq!(records.last().unwrap().run_type, RunType::Full);
    assert_eq!(records.last().unwrap().total_rows, 25);
}

#[tokio::test]
async fn incremental_sync_advances_the_watermark() {
    let (engine, source, destination, checkpoints, _run_log) = engine_for(orders_rows(5));
    let config = orders_config(2);

    let summary = engine.incremental_sync(&config, None).await.unwrap();
    assert_eq!(summary.rows_synced, 5);
    assert_eq!(
        checkpoints.load("orders").await.unwrap().unwrap().last_sync_value,
        Some(Watermark::Int(5))
    );

    // New rows arrive; only they are transferred.
    source
        .push_rows(vec![orders_row(6, 6, "new"), orders_row(7, 7, "new")])
        .await;

    let summary = engine.incremental_sync(&config, None).await.unwrap();
    assert_eq!(summary.rows_synced, 2);
    assert_eq!(destination.row_count("orders").await.unwrap(), 7);

    // The checkpoint records the statistics of this run, not a lifetime total.
    let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_value, Some(Watermark::Int(7)));
    assert_eq!(checkpoint.row_count, 2);
}

#[tokio::test]
async fn noop_incremental_run_leaves_checkpoint_unchanged() {
    let (engine, _source, _destination, checkpoints, _run_log) = engine_for(orders_rows(5));
    let config = orders_config(10);

    engine.incremental_sync(&config, None).await.unwrap();
    let before = checkpoints.load("orders").await.unwrap().unwrap();

    let summary = engine.incremental_sync(&config, None).await.unwrap();
    assert_eq!(summary.rows_synced, 0);
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.status, RunStatus::Completed);

    let after = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn watermark_is_monotonic_across_runs() {
    let (engine, source, _destination, checkpoints, _run_log) = engine_for(orders_rows(3));
    let config = orders_config(2);

    let mut last = None;
    for generation in 0..4i64 {
        engine.incremental_sync(&config, None).await.unwrap();

        let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
        assert!(checkpoint.last_sync_value >= last);
        last = checkpoint.last_sync_value.clone();

        // Every other generation adds nothing, so some runs are no-ops.
        if generation % 2 == 0 {
            let base = 10 * (generation + 1);
            source
                .push_rows(vec![orders_row(base, base, "more")])
                .await;
        }
    }
}

#[tokio::test]
async fn failed_batch_aborts_and_preserves_checkpoint() {
    let (engine, _source, destination, checkpoints, run_log) = engine_for(orders_rows(10));
    let config = orders_config(2);

    // Batch 3 (rows 5 and 6) fails at the destination.
    destination.fail_on_batch(3).await;

    let err = engine.incremental_sync(&config, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DestinationQueryFailed);

    // Batches 1 and 2 committed; the checkpoint reflects exactly those.
    assert_eq!(destination.write_log("orders").await, vec![2, 2]);
    let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_value, Some(Watermark::Int(4)));
    assert_eq!(checkpoint.row_count, 4);

    let last = run_log.records().await.pop().unwrap();
    assert_eq!(last.status, RunStatus::Failed);
    assert_eq!(last.total_rows, 4);
    assert!(last.error_message.unwrap().contains("Batch write failure"));

    // Re-running resumes at batch 3; rows from batches 1-2 are not rewritten.
    let summary = engine.incremental_sync(&config, None).await.unwrap();
    assert_eq!(summary.rows_synced, 6);
    assert_eq!(destination.write_log("orders").await, vec![2, 2, 2, 2, 2]);
    assert_eq!(destination.row_count("orders").await.unwrap(), 10);
    assert_eq!(
        checkpoints.load("orders").await.unwrap().unwrap().last_sync_value,
        Some(Watermark::Int(10))
    );
}

#[tokio::test]
async fn source_fetch_failure_marks_run_failed() {
    let (engine, source, _destination, checkpoints, run_log) = engine_for(orders_rows(4));
    source.fail_on_fetch(2).await;

    let err = engine
        .incremental_sync(&orders_config(2), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);

    // Batch 1 committed before the failure.
    let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_value, Some(Watermark::Int(2)));
    assert_eq!(run_log.records().await.pop().unwrap().status, RunStatus::Failed);
}

#[tokio::test]
async fn invalid_config_fails_before_anything_runs() {
    let (engine, source, destination, _checkpoints, run_log) = engine_for(orders_rows(3));

    let mut config = orders_config(10);
    config.batch_size = 0;

    let err = engine.full_sync(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);

    // Nothing was opened, fetched, written, or logged.
    assert_eq!(source.fetches().await, 0);
    assert!(!destination.table_exists("orders").await.unwrap());
    assert!(run_log.records().await.is_empty());
}

#[tokio::test]
async fn incremental_without_watermark_column_is_rejected() {
    let (engine, _source, _destination, _checkpoints, _run_log) = engine_for(orders_rows(3));

    let mut config = orders_config(10);
    config.watermark_column = None;

    let err = engine.incremental_sync(&config, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigError);
}

#[tokio::test]
async fn checkpoint_save_failure_degrades_to_in_memory() {
    let (engine, _source, destination, checkpoints, _run_log) = engine_for(orders_rows(6));
    checkpoints.fail_saves(true).await;

    let summary = engine.incremental_sync(&orders_config(2), None).await.unwrap();

    // The run itself succeeds, but durability was not achieved.
    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.rows_synced, 6);
    assert!(!summary.checkpoint_durable);
    assert_eq!(destination.row_count("orders").await.unwrap(), 6);
    assert_eq!(checkpoints.load("orders").await.unwrap(), None);
}

#[tokio::test]
async fn test_run_never_persists_a_checkpoint() {
    let (engine, _source, destination, checkpoints, run_log) = engine_for(orders_rows(4));

    let rows = engine.sync_in_batches(&orders_config(3)).await.unwrap();

    assert_eq!(rows, 4);
    assert_eq!(destination.row_count("orders").await.unwrap(), 4);
    assert_eq!(checkpoints.load("orders").await.unwrap(), None);
    assert_eq!(run_log.records().await.pop().unwrap().run_type, RunType::Test);
}

#[tokio::test]
async fn initial_watermark_bounds_the_first_incremental_run() {
    let (engine, _source, destination, _checkpoints, _run_log) = engine_for(orders_rows(8));

    let summary = engine
        .incremental_sync(&orders_config(10), Some(Watermark::Int(5)))
        .await
        .unwrap();

    assert_eq!(summary.rows_synced, 3);
    assert_eq!(destination.row_count("orders").await.unwrap(), 3);
}

/// Destination wrapper that requests a stop (or pause) once a configured
/// number of batches has been written, so control signals land exactly at a
/// batch boundary.
#[derive(Clone)]
struct SignalAfterBatches {
    inner: MemoryDestination,
    control: Arc<Mutex<Option<RunControl>>>,
    signal_after: usize,
    pause_instead: bool,
    batches: Arc<AtomicUsize>,
}

impl SignalAfterBatches {
    fn new(inner: MemoryDestination, signal_after: usize, pause_instead: bool) -> Self {
        Self {
            inner,
            control: Arc::new(Mutex::new(None)),
            signal_after,
            pause_instead,
            batches: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_control(&self, control: RunControl) {
        *self.control.lock().unwrap() = Some(control);
    }
}

impl Destination for SignalAfterBatches {
    async fn table_exists(&self, table: &str) -> SyncResult<bool> {
        self.inner.table_exists(table).await
    }

    async fn create_table(&self, schema: &TableSchema) -> SyncResult<()> {
        self.inner.create_table(schema).await
    }

    async fn insert_batch(&self, table: &str, rows: Vec<TableRow>) -> SyncResult<u64> {
        let written = self.inner.insert_batch(table, rows).await?;

        let batches = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if batches == self.signal_after
            && let Some(control) = self.control.lock().unwrap().as_ref()
        {
            if self.pause_instead {
                control.pause();
            } else {
                control.stop();
            }
        }

        Ok(written)
    }

    async fn row_count(&self, table: &str) -> SyncResult<u64> {
        self.inner.row_count(table).await
    }
}

#[tokio::test]
async fn stop_is_honored_at_the_next_batch_boundary() {
    let source = MemorySource::new(orders_schema(), orders_rows(10));
    let memory = MemoryDestination::new();
    // Stop is requested right after batch 3 commits; the engine observes it
    // before fetching batch 4.
    let destination = SignalAfterBatches::new(memory.clone(), 3, false);
    let checkpoints = MemoryCheckpointStore::new();
    let run_log = MemoryRunLog::new();

    let engine = SyncEngine::new(
        source,
        destination.clone(),
        checkpoints.clone(),
        run_log.clone(),
    );
    destination.set_control(engine.control());

    let summary = engine
        .incremental_sync(&orders_config(1), None)
        .await
        .unwrap();

    assert_eq!(summary.status, RunStatus::Stopped);
    assert_eq!(summary.rows_synced, 3);
    assert_eq!(summary.batches, 3);
    assert_eq!(memory.write_log("orders").await, vec![1, 1, 1]);

    // The checkpoint persisted whatever was advanced before the stop.
    let checkpoint = checkpoints.load("orders").await.unwrap().unwrap();
    assert_eq!(checkpoint.last_sync_value, Some(Watermark::Int(3)));

    let last = run_log.records().await.pop().unwrap();
    assert_eq!(last.status, RunStatus::Stopped);
    assert_eq!(last.total_rows, 3);

    // The next run resumes from the stop point.
    let summary = engine
        .incremental_sync(&orders_config(1), None)
        .await
        .unwrap();
    assert_eq!(summary.rows_synced, 7);
    assert_eq!(memory.row_count("orders").await.unwrap(), 10);
}

#[tokio::test]
async fn pause_parks_the_run_until_resumed() {
    let source = MemorySource::new(orders_schema(), orders_rows(6));
    let memory = MemoryDestination::new();
    let destination = SignalAfterBatches::new(memory.clone(), 2, true);
    let checkpoints = MemoryCheckpointStore::new();
    let run_log = MemoryRunLog::new();

    let engine = Arc::new(SyncEngine::new(
        source,
        destination.clone(),
        checkpoints.clone(),
        run_log.clone(),
    ));
    destination.set_control(engine.control());
    let control = engine.control();

    let run = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.incremental_sync(&orders_config(1), None).await })
    };

    // Wait until the run has parked in the paused state.
    let parked = async {
        loop {
            let records = run_log.records().await;
            if records.iter().any(|r| r.status == RunStatus::Paused) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), parked)
        .await
        .expect("run never paused");

    // Paused means no further batches are written.
    assert!(!run.is_finished());
    assert_eq!(memory.write_log("orders").await, vec![1, 1]);

    control.resume();

    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("run never resumed")
        .unwrap()
        .unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.rows_synced, 6);

    // The record transitioned Running -> Paused -> Running -> Completed.
    let statuses: Vec<RunStatus> = run_log.records().await.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            RunStatus::Running,
            RunStatus::Paused,
            RunStatus::Running,
            RunStatus::Completed
        ]
    );
}

#[tokio::test]
async fn unorderable_watermark_cell_fails_the_run() {
    let source = MemorySource::new(
        orders_schema(),
        vec![
            orders_row(1, 1, "fine"),
            // Watermark cell is a float, which cannot order a checkpoint.
            // The source refuses to serve it rather than dropping the row.
            TableRow::new(vec![
                sync::types::Cell::I64(2),
                sync::types::Cell::F64(2.5),
                sync::types::Cell::String("bad".to_string()),
            ]),
        ],
    );
    let destination = MemoryDestination::new();
    let checkpoints = MemoryCheckpointStore::new();
    let run_log = MemoryRunLog::new();
    let engine = SyncEngine::new(
        source,
        destination.clone(),
        checkpoints.clone(),
        run_log.clone(),
    );

    let err = engine
        .incremental_sync(&orders_config(1), None)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidData);
    assert!(err.detail().unwrap().contains("'version'"));

    // Nothing was transferred and the run is recorded as failed.
    assert_eq!(destination.row_count("orders").await.unwrap(), 0);
    assert_eq!(checkpoints.load("orders").await.unwrap(), None);
    assert_eq!(run_log.records().await.pop().unwrap().status, RunStatus::Failed);
}
