//! Cron-triggered full sync.
//!
//! Each tick asks the orchestrator for a `full` run. The orchestrator owns
//! the lock and the queue, so a tick that lands during another run just
//! queues behind it.

use std::sync::Arc;
use std::time::Duration;

use stocksync_core::{SyncOrchestrator, TokenLifecycleManager};
use stocksync_domain::{SyncConfig, SyncKind, TriggeredBy};
use tracing::{error, info, instrument};

use super::cron_job::{CronJob, JobFn, SchedulerConfig};
use super::error::SchedulerResult;

const SCHEDULER_NAME: &str = "sync";

/// The job only enqueues a run, it never waits for the run itself.
const JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Requests a full sync on the configured cron schedule.
pub struct SyncScheduler {
    job: CronJob,
}

impl SyncScheduler {
    /// Scheduler on `scheduled_cron`.
    pub fn new(
        config: &SyncConfig,
        orchestrator: SyncOrchestrator,
        tokens: Arc<TokenLifecycleManager>,
    ) -> Self {
        Self::with_config(
            SchedulerConfig::new(config.scheduled_cron.clone(), JOB_TIMEOUT),
            orchestrator,
            tokens,
        )
    }

    /// Scheduler with an explicit cron config.
    pub fn with_config(
        config: SchedulerConfig,
        orchestrator: SyncOrchestrator,
        tokens: Arc<TokenLifecycleManager>,
    ) -> Self {
        let job: JobFn = Arc::new(move || {
            let orchestrator = orchestrator.clone();
            let tokens = Arc::clone(&tokens);
            Box::pin(async move { trigger_full_sync(&orchestrator, &tokens).await })
        });
        Self { job: CronJob::new(SCHEDULER_NAME, config, job) }
    }

    /// Start the cron job.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        self.job.start().await
    }

    /// Stop the cron job.
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

#[instrument(skip_all)]
async fn trigger_full_sync(orchestrator: &SyncOrchestrator, tokens: &TokenLifecycleManager) {
    match tokens.is_active().await {
        Ok(true) => {}
        Ok(false) => {
            info!(scheduler = SCHEDULER_NAME, event = "skipped", "Bling integration inactive");
            return;
        }
        Err(err) => {
            error!(scheduler = SCHEDULER_NAME, error = %err, "Could not read credential state");
            return;
        }
    }

    match orchestrator.request_sync(SyncKind::Full, TriggeredBy::Scheduled).await {
        Ok(outcome) => info!(
            scheduler = SCHEDULER_NAME,
            event = "requested",
            run_id = %outcome.run_id,
            queued = outcome.queued,
            queue_position = outcome.queue_position,
            "Scheduled full sync requested"
        ),
        Err(err) => error!(
            scheduler = SCHEDULER_NAME,
            error = %err,
            "Scheduled full sync request failed"
        ),
    }
}
