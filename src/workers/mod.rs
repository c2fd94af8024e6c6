//! Leader-only background maintenance on a cron schedule.

pub mod report_cleanup;
pub mod session_cleanup;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::config::{RetentionConfig, WorkerConfig};
use crate::store::Store;

/// Upper bound for a single job invocation.
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace period between the shutdown signal and scheduler teardown.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionCleanup,
    ReportCleanup,
}

impl WorkerName {
    pub const ALL: [WorkerName; 2] = [Self::SessionCleanup, Self::ReportCleanup];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCleanup => "session_cleanup",
            Self::ReportCleanup => "report_cleanup",
        }
    }

    /// Six-field cron expression (with seconds).
    pub fn cron(self) -> &'static str {
        match self {
            // 每小时整点
            Self::SessionCleanup => "0 0 * * * *",
            // 每天 03:30
            Self::ReportCleanup => "0 30 3 * * *",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

pub struct WorkerManager {
    store: Arc<Store>,
    shutdown_rx: broadcast::Receiver<()>,
    is_leader: bool,
    retention: RetentionConfig,
}

impl WorkerManager {
    pub fn new(
        store: Arc<Store>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
        retention: &RetentionConfig,
    ) -> Self {
        Self {
            store,
            shutdown_rx,
            is_leader: config.is_leader,
            retention: retention.clone(),
        }
    }

    /// Jobs this instance would schedule. Followers schedule nothing.
    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.is_leader {
            return Vec::new();
        }
        WorkerName::ALL
            .into_iter()
            .map(|name| JobSpec {
                name,
                cron: name.cron(),
                enabled: match name {
                    WorkerName::SessionCleanup => true,
                    WorkerName::ReportCleanup => self.retention.report_ttl_days > 0,
                },
            })
            .collect()
    }

    /// Runs the scheduler until the shutdown channel fires.
    pub async fn start(mut self) -> Result<(), WorkerError> {
        if !self.is_leader {
            tracing::info!("Not the worker leader, background jobs disabled");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        for spec in self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(worker = spec.name.as_str(), "Worker disabled by config");
                continue;
            }
            self.schedule(&scheduler, &spec).await;
        }
        scheduler.start().await?;
        tracing::info!("Worker manager started");

        let _ = self.shutdown_rx.recv().await;
        tracing::info!(drain_secs = DRAIN_TIMEOUT.as_secs(), "Worker manager draining");
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        scheduler.shutdown().await?;
        Ok(())
    }

    async fn schedule(&self, scheduler: &JobScheduler, spec: &JobSpec) {
        let store = self.store.clone();
        let name = spec.name;
        let report_ttl_days = self.retention.report_ttl_days;

        let added = add_guarded_job(scheduler, spec.cron, name.as_str(), move || {
            let store = store.clone();
            async move {
                match name {
                    WorkerName::SessionCleanup => session_cleanup::run(&store).await,
                    WorkerName::ReportCleanup => report_cleanup::run(&store, report_ttl_days).await,
                }
            }
        })
        .await;

        match added {
            Ok(()) => tracing::info!(worker = name.as_str(), cron = spec.cron, "Registered worker"),
            Err(e) => tracing::error!(worker = name.as_str(), cron = spec.cron, error = %e, "Failed to register worker"),
        }
    }
}

/// Marks a job as running; cleared on drop so a panicking or timed-out run
/// never blocks the next tick.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Schedules `run` so that overlapping ticks are skipped and every run is
/// bounded by [`WORKER_TIMEOUT`].
async fn add_guarded_job<Fut, F>(
    scheduler: &JobScheduler,
    cron: &str,
    name: &'static str,
    mut run: F,
) -> Result<(), WorkerError>
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let Some(guard) = RunGuard::try_acquire(&running) else {
            tracing::warn!(worker = name, "Previous run still in progress, skipping tick");
            return Box::pin(async {});
        };

        let fut = run();
        Box::pin(async move {
            let _guard = guard;
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(worker = name, timeout_secs = WORKER_TIMEOUT.as_secs(), "Worker timed out");
            }
        })
    })?;
    scheduler.add(job).await?;
    Ok(())
}
