//! Periodic proactive token renewal.

use std::sync::Arc;
use std::time::Duration;

use stocksync_core::{RenewalOutcome, TokenLifecycleManager};
use stocksync_domain::TokenConfig;
use tracing::{debug, error, info, warn};

use super::cron_job::{CronJob, JobFn, SchedulerConfig};
use super::error::SchedulerResult;

const SCHEDULER_NAME: &str = "token_renewal";
const JOB_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs [`TokenLifecycleManager::check_and_renew`] on the configured cron schedule.
pub struct TokenRenewalScheduler {
    job: CronJob,
}

impl TokenRenewalScheduler {
    /// Scheduler on `renewal_cron`.
    pub fn new(config: &TokenConfig, tokens: Arc<TokenLifecycleManager>) -> Self {
        Self::with_config(SchedulerConfig::new(config.renewal_cron.clone(), JOB_TIMEOUT), tokens)
    }

    /// Scheduler with an explicit cron config.
    pub fn with_config(config: SchedulerConfig, tokens: Arc<TokenLifecycleManager>) -> Self {
        let job: JobFn = Arc::new(move || {
            let tokens = Arc::clone(&tokens);
            Box::pin(async move {
                match tokens.check_and_renew().await {
                    Ok(outcome) => log_outcome(outcome),
                    Err(err) => error!(
                        scheduler = SCHEDULER_NAME,
                        error = %err,
                        "Token renewal check failed"
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

fn log_outcome(outcome: RenewalOutcome) {
    match outcome {
        RenewalOutcome::NotDue | RenewalOutcome::NotConfigured | RenewalOutcome::Inactive => {
            debug!(scheduler = SCHEDULER_NAME, outcome = ?outcome, "Token renewal not needed")
        }
        RenewalOutcome::Renewed => {
            info!(scheduler = SCHEDULER_NAME, outcome = ?outcome, "Token renewed ahead of expiry")
        }
        RenewalOutcome::Deactivated => error!(
            scheduler = SCHEDULER_NAME,
            outcome = ?outcome,
            "Refresh token rejected, integration deactivated"
        ),
        RenewalOutcome::TransientNotified | RenewalOutcome::TransientSuppressed => warn!(
            scheduler = SCHEDULER_NAME,
            outcome = ?outcome,
            "Token renewal failed, will retry on next tick"
        ),
    }
}
