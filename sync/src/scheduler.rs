//! Cron-style scheduling of guarded sync jobs.
//!
//! A daily hour/minute trigger drives each registered job. Firings are wrapped
//! with the run lock by [`guarded`], so an overlapping firing is skipped, never
//! queued or run concurrently. Stopping the scheduler is graceful: it waits
//! for any in-flight job body to return.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use config::shared::ScheduleConfig;

use crate::bail;
use crate::concurrency::run_lock::{RunLock, TryAcquire};
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, SyncResult};

/// A schedulable job body.
pub type Job = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Wraps an async closure into a [`Job`].
pub fn job<F, Fut>(f: F) -> Job
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Wraps a job with the run lock for `table_name`.
///
/// The returned job performs a non-blocking acquire before invoking the
/// wrapped body and releases the lock afterwards on every path — the token is
/// released on drop, so even a panicking body cannot leak it. If the lock is
/// busy the firing is a documented no-op, logged at informational level.
pub fn guarded(lock: &RunLock, table_name: &str, inner: Job) -> Job {
    let lock = lock.clone();
    let table_name = table_name.to_string();

    Arc::new(move || {
        let lock = lock.clone();
        let table_name = table_name.clone();
        let inner = inner.clone();

        Box::pin(async move {
            match lock.try_acquire(&table_name) {
                TryAcquire::Acquired(token) => {
                    inner().await;
                    lock.release(token);
                }
                TryAcquire::Busy => {
                    info!(table_name, "previous sync still running, skipping this firing");
                }
            }
        })
    })
}

/// Daily trigger at a fixed UTC hour and minute.
#[derive(Debug, Clone, Copy)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    /// Creates a schedule, rejecting out-of-range fields.
    pub fn new(hour: u32, minute: u32) -> SyncResult<Self> {
        if hour > 23 || minute > 59 {
            bail!(
                ErrorKind::ConfigError,
                "Schedule time out of range",
                format!("{hour:02}:{minute:02}")
            );
        }

        Ok(Self { hour, minute })
    }

    /// Returns the next firing time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after
            .date_naive()
            .and_hms_opt(self.hour, self.minute, 0)
            .expect("hour and minute are validated on construction")
            .and_utc();

        if today > after {
            today
        } else {
            today + ChronoDuration::days(1)
        }
    }
}

impl TryFrom<&ScheduleConfig> for DailySchedule {
    type Error = crate::error::SyncError;

    fn try_from(config: &ScheduleConfig) -> SyncResult<Self> {
        DailySchedule::new(config.hour, config.minute)
    }
}

/// Converts a UTC datetime to a tokio Instant.
///
/// Returns `None` if the datetime is not in the future.
fn date_time_to_instant(date_time: DateTime<Utc>) -> Option<Instant> {
    let now = Utc::now();
    if date_time <= now {
        return None;
    }

    let duration = (date_time - now).to_std().ok()?;
    Some(Instant::now() + duration)
}

struct JobSpec {
    name: String,
    schedule: DailySchedule,
    job: Job,
}

enum SchedulerState {
    Stopped,
    Running {
        shutdown_tx: ShutdownTx,
        handles: Vec<JoinHandle<()>>,
    },
}

/// Drives registered jobs from a background timer per job.
///
/// The scheduler has exactly two states, stopped and running; `start` while
/// running and `stop` while stopped are idempotent no-ops. The lock wrapped
/// around each job by [`guarded`] — not the timer layout — is what guarantees
/// at most one run per table, since manual triggers must respect it too.
pub struct Scheduler {
    jobs: Vec<JobSpec>,
    state: SchedulerState,
}

impl Scheduler {
    /// Creates a stopped scheduler with no jobs.
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            state: SchedulerState::Stopped,
        }
    }

    /// Registers a job. Takes effect on the next `start`.
    pub fn add_job(&mut self, name: impl Into<String>, schedule: DailySchedule, job: Job) {
        self.jobs.push(JobSpec {
            name: name.into(),
            schedule,
            job,
        });
    }

    /// Starts the background timers. A no-op when already running.
    pub fn start(&mut self) {
        if let SchedulerState::Running { .. } = self.state {
            info!("scheduler already running");
            return;
        }

        let (shutdown_tx, _) = create_shutdown_channel();

        let handles = self
            .jobs
            .iter()
            .map(|spec| {
                let name = spec.name.clone();
                let schedule = spec.schedule;
                let job = spec.job.clone();
                let mut shutdown_rx = shutdown_tx.subscribe();

                tokio::spawn(async move {
                    loop {
                        let at = schedule.next_fire(Utc::now());
                        debug!(job = %name, next_fire = %at, "waiting until next firing");

                        let Some(instant) = date_time_to_instant(at) else {
                            // The firing time raced past; fire on the next loop
                            // iteration instead.
                            continue;
                        };

                        tokio::select! {
                            _ = sleep_until(instant) => {
                                debug!(job = %name, "firing scheduled job");
                                // The body runs inline so a stop waits for it.
                                job().await;
                            }
                            _ = shutdown_rx.changed() => {
                                debug!(job = %name, "scheduler job shutting down");
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        self.state = SchedulerState::Running {
            shutdown_tx,
            handles,
        };

        info!(jobs = self.jobs.len(), "scheduler started");
    }

    /// Stops the background timers, waiting for any in-flight job body to
    /// return. A no-op when already stopped.
    pub async fn stop(&mut self) {
        let state = std::mem::replace(&mut self.state, SchedulerState::Stopped);
        let SchedulerState::Running {
            shutdown_tx,
            handles,
        } = state
        else {
            info!("scheduler already stopped");
            return;
        };

        // Receivers observe the change; an in-flight body finishes before its
        // task re-enters the select and sees it.
        let _ = shutdown_tx.send(());

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "scheduler job task failed to join");
            }
        }

        info!("scheduler stopped");
    }

    /// Returns whether the scheduler is currently running.
    pub fn is_running(&self) -> bool {
        matches!(self.state, SchedulerState::Running { .. })
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
