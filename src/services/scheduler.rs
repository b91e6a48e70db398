use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::services::directory_sync::Reconciler;

/// Periodic directory sync. `start` consumes the scheduler, so one
/// instance installs at most one timer.
pub struct SyncScheduler {
    reconciler: Option<Reconciler>,
    interval: Duration,
    run_on_startup: bool,
}

impl SyncScheduler {
    /// `reconciler` is `None` when the directory is not configured.
    #[must_use]
    pub fn new(reconciler: Option<Reconciler>, config: &SyncConfig) -> Self {
        Self {
            reconciler,
            interval: config.interval(),
            run_on_startup: config.run_on_startup,
        }
    }

    pub async fn start(self, shutdown: CancellationToken) -> Result<SchedulerHandle> {
        let Some(reconciler) = self.reconciler else {
            info!("Directory not configured, sync scheduler not started");
            return Ok(SchedulerHandle::default());
        };

        // Held for the duration of a pass; overlapping ticks are skipped.
        let in_flight = Arc::new(Mutex::new(()));
        let mut tasks = Vec::new();

        if self.run_on_startup {
            let reconciler = reconciler.clone();
            let in_flight = Arc::clone(&in_flight);
            let shutdown = shutdown.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = in_flight.lock().await;
                if shutdown.is_cancelled() {
                    return;
                }
                info!("Running startup directory sync");
                reconciler.sync_all().await;
            }));
        }

        let mut sched = JobScheduler::new().await?;

        let job_reconciler = reconciler.clone();
        let job_in_flight = Arc::clone(&in_flight);
        let job_shutdown = shutdown.clone();
        let job = Job::new_repeated_async(self.interval, move |_uuid, _lock| {
            let reconciler = job_reconciler.clone();
            let in_flight = Arc::clone(&job_in_flight);
            let shutdown = job_shutdown.clone();
            Box::pin(async move {
                let Ok(_guard) = in_flight.try_lock() else {
                    warn!(
                        event = "job_skipped",
                        job_name = "directory_sync",
                        "Previous directory sync still running, skipping tick"
                    );
                    return;
                };
                if shutdown.is_cancelled() {
                    return;
                }
                reconciler.sync_all().await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!(
            interval_seconds = self.interval.as_secs(),
            "Directory sync scheduled"
        );

        tasks.push(tokio::spawn(async move {
            shutdown.cancelled().await;
            info!("Stopping sync scheduler...");

            if let Err(e) = sched.shutdown().await {
                error!(error = %e, "Failed to shut down job scheduler");
            }

            // Waits for a pass that is already running.
            drop(in_flight.lock().await);
            info!("Sync scheduler stopped");
        }));

        Ok(SchedulerHandle { tasks })
    }
}

/// Background tasks of a started scheduler.
#[derive(Default)]
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Resolves once the scheduler has fully stopped after cancellation.
    pub async fn wait(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Sync scheduler task panicked");
            }
        }
    }
}
