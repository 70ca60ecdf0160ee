//! Shared lifecycle for the cron-driven background jobs.
//!
//! Every scheduler in this module wraps a [`CronJob`]: join handles are
//! tracked, cancellation is explicit, and start, stop, join and each job
//! execution run under a timeout.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{SchedulerError, SchedulerResult};

pub(crate) type JobFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub(crate) type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Cron schedule plus the timeouts applied around it.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Six-field cron expression (seconds first).
    pub cron_expression: String,
    /// Upper bound for one job execution.
    pub job_timeout: Duration,
    /// Timeout for starting the scheduler
    pub start_timeout: Duration,
    /// Timeout for shutting the scheduler down
    pub stop_timeout: Duration,
    /// Timeout for awaiting the monitor task join handle.
    pub join_timeout: Duration,
}

impl SchedulerConfig {
    /// Config with five-second lifecycle timeouts.
    pub fn new(cron_expression: impl Into<String>, job_timeout: Duration) -> Self {
        Self {
            cron_expression: cron_expression.into(),
            job_timeout,
            start_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(5),
        }
    }
}

pub(crate) struct CronJob {
    name: &'static str,
    config: SchedulerConfig,
    job: JobFn,
    scheduler: Option<JobScheduler>,
    monitor_handle: Option<JoinHandle<()>>,
    cancellation: CancellationToken,
}

impl CronJob {
    pub(crate) fn new(name: &'static str, config: SchedulerConfig, job: JobFn) -> Self {
        Self {
            name,
            config,
            job,
            scheduler: None,
            monitor_handle: None,
            cancellation: CancellationToken::new(),
        }
    }

    pub(crate) fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub(crate) fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }

    pub(crate) async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        self.cancellation = CancellationToken::new();

        let scheduler = self.build_scheduler().await?;
        let start_timeout = self.config.start_timeout;
        tokio::time::timeout(start_timeout, scheduler.start())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: start_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StartFailed(format!("{err:?}")))?;

        self.scheduler = Some(scheduler);

        let cancel = self.cancellation.clone();
        let name = self.name;
        self.monitor_handle = Some(tokio::spawn(async move {
            cancel.cancelled().await;
            debug!(scheduler = name, event = "monitor_cancelled", "Scheduler monitor cancelled");
        }));

        info!(
            scheduler = self.name,
            event = "start",
            cron = %self.config.cron_expression,
            "Scheduler started"
        );
        Ok(())
    }

    pub(crate) async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation.cancel();

        let stop_timeout = self.config.stop_timeout;
        tokio::time::timeout(stop_timeout, scheduler.shutdown())
            .await
            .map_err(|_| SchedulerError::Timeout { seconds: stop_timeout.as_secs() })?
            .map_err(|err| SchedulerError::StopFailed(format!("{err:?}")))?;

        if let Some(handle) = self.monitor_handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: join_timeout.as_secs() })?
                .map_err(|err| SchedulerError::TaskJoinFailed(err.to_string()))?;
        }

        info!(scheduler = self.name, event = "stop", "Scheduler stopped");
        Ok(())
    }

    async fn build_scheduler(&self) -> SchedulerResult<JobScheduler> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|err| SchedulerError::CreationFailed(format!("{err:?}")))?;

        let name = self.name;
        let job = Arc::clone(&self.job);
        let job_timeout = self.config.job_timeout;

        let definition = Job::new_async(self.config.cron_expression.as_str(), move |_id, _lock| {
            let job = Arc::clone(&job);
            Box::pin(async move {
                let started = Instant::now();
                match tokio::time::timeout(job_timeout, job()).await {
                    Ok(()) => debug!(
                        scheduler = name,
                        event = "job_complete",
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Scheduled job finished"
                    ),
                    Err(_) => warn!(
                        scheduler = name,
                        event = "job_timeout",
                        timeout_secs = job_timeout.as_secs(),
                        "Scheduled job timed out"
                    ),
                }
            })
        })
        .map_err(|err| SchedulerError::JobRegistrationFailed(format!("{err:?}")))?;

        let job_id = definition.guid();
        scheduler
            .add(definition)
            .await
            .map_err(|err| SchedulerError::JobRegistrationFailed(format!("{err:?}")))?;

        debug!(scheduler = name, cron = %self.config.cron_expression, job_id = %job_id, "Registered job");
        Ok(scheduler)
    }
}

impl Drop for CronJob {
    fn drop(&mut self) {
        self.cancellation.cancel();
        if self.scheduler.is_some() {
            warn!(scheduler = self.name, "Scheduler dropped while running; call stop() first");
        }
    }
}
