//! Periodic reconciliation sweep: lifts elapsed rate-limit pauses and
//! requeues retries whose backoff has expired.

use std::sync::Arc;
use std::time::Duration;

use stocksync_core::SyncOrchestrator;
use stocksync_domain::SyncConfig;
use tracing::{debug, error, info};

use super::cron_job::{CronJob, JobFn, SchedulerConfig};
use super::error::SchedulerResult;

const SCHEDULER_NAME: &str = "reconcile";
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs [`SyncOrchestrator::reconcile`] on the configured cron schedule.
pub struct ReconcileScheduler {
    job: CronJob,
}

impl ReconcileScheduler {
    /// Scheduler on `reconcile_cron`.
    pub fn new(config: &SyncConfig, orchestrator: SyncOrchestrator) -> Self {
        Self::with_config(SchedulerConfig::new(config.reconcile_cron.clone(), JOB_TIMEOUT), orchestrator)
    }

    /// Scheduler with an explicit cron config.
    pub fn with_config(config: SchedulerConfig, orchestrator: SyncOrchestrator) -> Self {
        let job: JobFn = Arc::new(move || {
            let orchestrator = orchestrator.clone();
            Box::pin(async move {
                match orchestrator.reconcile().await {
                    Ok(report) if report.requeued > 0 || report.pause_lifted => info!(
                        scheduler = SCHEDULER_NAME,
                        requeued = report.requeued,
                        pause_lifted = report.pause_lifted,
                        "Reconciliation sweep moved work"
                    ),
                    Ok(_) => debug!(scheduler = SCHEDULER_NAME, "Nothing to reconcile"),
                    Err(err) => error!(
                        scheduler = SCHEDULER_NAME,
                        error = %err,
                        "Reconciliation sweep failed"
                    ),
                }
            })
        });
        Self { job: CronJob::new(SCHEDULER_NAME, config, job) }
    }

    /// Start the cron job.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        self.job.start().await
    }

    /// Stop the cron job and wait for it to finish.
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        self.job.stop().await
    }

    /// Whether the job is scheduled.
    pub fn is_running(&self) -> bool {
        self.job.is_running()
    }

    /// Active schedule.
    pub fn config(&self) -> &SchedulerConfig {
        self.job.config()
    }
}
