//! Cron-driven background jobs owned by the server process.

use std::sync::Arc;

use stocksync_infra::{ReconcileScheduler, SchedulerResult, SyncScheduler, TokenRenewalScheduler};
use tracing::{info, warn};

use super::AppContext;

/// Schedulers started with the server and stopped on shutdown.
pub struct BackgroundJobs {
    sync: Option<SyncScheduler>,
    reconcile: ReconcileScheduler,
    token_renewal: TokenRenewalScheduler,
}

impl BackgroundJobs {
    /// Build the schedulers from `ctx`. The sync schedule is only created when enabled.
    pub fn new(ctx: &AppContext) -> Self {
        let sync = ctx.config.sync.scheduled_enabled.then(|| {
            SyncScheduler::new(&ctx.config.sync, ctx.orchestrator.clone(), Arc::clone(&ctx.tokens))
        });
        Self {
            sync,
            reconcile: ReconcileScheduler::new(&ctx.config.sync, ctx.orchestrator.clone()),
            token_renewal: TokenRenewalScheduler::new(&ctx.config.token, Arc::clone(&ctx.tokens)),
        }
    }

    /// Start every scheduler; stops the ones already started if a later one
    /// fails.
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if let Err(err) = self.start_all().await {
            self.stop().await;
            return Err(err);
        }
        info!(scheduled_sync = self.sync.is_some(), "Background jobs started");
        Ok(())
    }

    async fn start_all(&mut self) -> SchedulerResult<()> {
        self.reconcile.start().await?;
        self.token_renewal.start().await?;
        if let Some(sync) = self.sync.as_mut() {
            sync.start().await?;
        }
        Ok(())
    }

    /// Stop whatever is running. Failures are logged.
    pub async fn stop(&mut self) {
        if let Some(sync) = self.sync.as_mut().filter(|sync| sync.is_running()) {
            if let Err(err) = sync.stop().await {
                warn!(scheduler = "sync", error = %err, "Failed to stop scheduler");
            }
        }
        if self.reconcile.is_running() {
            if let Err(err) = self.reconcile.stop().await {
                warn!(scheduler = "reconcile", error = %err, "Failed to stop scheduler");
            }
        }
        if self.token_renewal.is_running() {
            if let Err(err) = self.token_renewal.stop().await {
                warn!(scheduler = "token_renewal", error = %err, "Failed to stop scheduler");
            }
        }
    }

    /// True while the always-on schedulers run.
    pub fn is_running(&self) -> bool {
        self.reconcile.is_running() || self.token_renewal.is_running()
    }
}
