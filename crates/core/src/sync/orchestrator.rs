//! Sync orchestrator
//!
//! Guarantees at most one sync run executes at a time across the process,
//! serializes excess requests in a strict FIFO queue, and recovers from
//! transient failures without operator intervention.
//!
//! Lock, queue and rate-limit pause live in one `tokio::sync::Mutex`. The
//! mutex is held across the write that marks a run `running`, so no caller
//! can observe the lock as free while a dequeued run has not yet been
//! persisted as running.
//!
//! Retries are durable: a failed run is persisted as `retrying` with a
//! `next_retry_at`, and [`SyncOrchestrator::reconcile`] (driven by a
//! periodic scheduler) re-enqueues due runs at the tail of the queue.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use stocksync_common::clock::Clock;
use stocksync_domain::constants::MAX_ERROR_MESSAGE_LEN;
use stocksync_domain::{
    IntegrationError, LockOwner, Result, SyncConfig, SyncCounts, SyncKind, SyncLock,
    SyncQueueEntry, SyncRequestOutcome, SyncRun, SyncStatus, SyncStatusSnapshot, TriggeredBy,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::ports::{SyncExecutor, SyncRunRepository};

/// Retry and pause policy.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry budget given to new runs
    pub max_retries: u32,
    /// Delay before the first retry; doubles with each attempt
    pub base_retry_delay: Duration,
    /// Global pause after a rate-limit signal without a vendor reset time
    pub rate_limit_cooldown: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for OrchestratorConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_retry_delay: seconds(config.base_retry_delay_secs),
            rate_limit_cooldown: seconds(config.rate_limit_cooldown_secs),
        }
    }
}

impl OrchestratorConfig {
    /// `2^retry_count * base_retry_delay`
    pub fn backoff(&self, retry_count: u32) -> Duration {
        2_i64
            .checked_pow(retry_count)
            .and_then(|factor| self.base_retry_delay.num_milliseconds().checked_mul(factor))
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }
}

fn seconds(secs: u64) -> Duration {
    i64::try_from(secs).ok().and_then(Duration::try_seconds).unwrap_or(Duration::MAX)
}

/// `now + delay`, saturating at the largest representable instant.
fn later(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Result of a reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Due retries moved back into the queue
    pub requeued: usize,
    /// Whether the sweep lifted an elapsed rate-limit pause
    pub pause_lifted: bool,
}

#[derive(Debug, Default)]
struct OrchestratorState {
    lock: SyncLock,
    queue: VecDeque<SyncQueueEntry>,
    paused_until: Option<DateTime<Utc>>,
}

impl OrchestratorState {
    fn is_paused(&self, now: DateTime<Utc>) -> bool {
        self.paused_until.is_some_and(|until| now < until)
    }

    /// Drop an elapsed pause. Returns true if one was lifted.
    fn lift_expired_pause(&mut self, now: DateTime<Utc>) -> bool {
        match self.paused_until {
            Some(until) if now >= until => {
                self.paused_until = None;
                true
            }
            _ => false,
        }
    }

    fn contains(&self, run_id: Uuid) -> bool {
        self.queue.iter().any(|entry| entry.run_id == run_id)
            || self.lock.owner().is_some_and(|owner| owner.run_id == run_id)
    }
}

/// What to do with a run after its executor returned.
enum RunDisposition {
    Completed(SyncCounts),
    Retry { retry_count: u32, next_retry_at: DateTime<Utc>, triggered_by: TriggeredBy, error: String },
    Failed(String),
}

struct Inner {
    runs: Arc<dyn SyncRunRepository>,
    executor: Arc<dyn SyncExecutor>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    state: Mutex<OrchestratorState>,
}

/// Single-flight sync orchestrator with a FIFO wait queue.
///
/// Cheap to clone; clones share the same lock and queue.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    /// Orchestrator recording runs in `runs` and running them on `executor`.
    pub fn new(
        runs: Arc<dyn SyncRunRepository>,
        executor: Arc<dyn SyncExecutor>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                runs,
                executor,
                clock,
                config,
                state: Mutex::new(OrchestratorState::default()),
            }),
        }
    }

    /// Request a sync run.
    ///
    /// Starts the run at once when the lock is free, nothing is waiting and
    /// no rate-limit pause is active. Otherwise the run is persisted as
    /// `queued` and appended to the queue. Never waits for the lock.
    ///
    /// # Errors
    /// Returns an error only when the new run cannot be persisted.
    #[instrument(skip(self), fields(kind = %kind, triggered_by = %triggered_by))]
    pub async fn request_sync(
        &self,
        kind: SyncKind,
        triggered_by: TriggeredBy,
    ) -> Result<SyncRequestOutcome> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        let now = inner.clock.now();
        state.lift_expired_pause(now);
        let run_id = Uuid::now_v7();

        if !state.lock.is_held() && state.queue.is_empty() && !state.is_paused(now) {
            let run = SyncRun::new(
                run_id,
                kind,
                triggered_by,
                SyncStatus::Running,
                inner.config.max_retries,
                now,
            );
            inner.runs.insert(&run).await?;

            let owner = LockOwner { run_id, kind, started_at: now };
            state.lock.try_acquire(owner);
            info!(run_id = %run_id, "Sync run started");
            inner.spawn_run(owner);

            return Ok(SyncRequestOutcome { run_id, queued: false, queue_position: 0 });
        }

        let run =
            SyncRun::new(run_id, kind, triggered_by, SyncStatus::Queued, inner.config.max_retries, now);
        inner.runs.insert(&run).await?;
        state.queue.push_back(SyncQueueEntry { kind, triggered_by, run_id });
        let queue_position = state.queue.len();
        info!(run_id = %run_id, queue_position, "Sync run queued");

        // A pause may have just elapsed with runs still waiting.
        inner.advance_locked(&mut state).await;

        Ok(SyncRequestOutcome { run_id, queued: true, queue_position })
    }

    /// Current lock holder, queue depth and active pause.
    pub async fn get_status(&self) -> SyncStatusSnapshot {
        let state = self.inner.state.lock().await;
        let now = self.inner.clock.now();
        SyncStatusSnapshot {
            locked: state.lock.is_held(),
            current_run: state.lock.owner().copied(),
            queue_depth: state.queue.len(),
            paused_until: state.paused_until.filter(|until| now < *until),
        }
    }

    /// Move due `retrying` runs back into the queue and advance it.
    ///
    /// # Errors
    /// Returns an error when the due runs cannot be read. Failures on single
    /// runs are logged and skipped.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let inner = &self.inner;
        let now = inner.clock.now();
        let due = inner.runs.find_due_retries(now).await?;

        let mut state = inner.state.lock().await;
        let pause_lifted = state.lift_expired_pause(now);
        if pause_lifted {
            info!("Rate-limit pause elapsed, resuming queue");
        }

        let mut requeued = 0;
        for run in due {
            if state.contains(run.id) {
                continue;
            }
            match inner.runs.mark_queued(run.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(run_id = %run.id, "Due retry already left retrying, skipped");
                    continue;
                }
                Err(err) => {
                    error!(run_id = %run.id, error = %err, "Failed to requeue due retry");
                    continue;
                }
            }
            state.queue.push_back(SyncQueueEntry {
                kind: run.kind,
                triggered_by: run.triggered_by,
                run_id: run.id,
            });
            requeued += 1;
            debug!(run_id = %run.id, retry_count = run.retry_count, "Due retry requeued");
        }

        inner.advance_locked(&mut state).await;

        if requeued > 0 {
            info!(requeued, "Reconciliation requeued due retries");
        }
        Ok(ReconcileReport { requeued, pause_lifted })
    }

    /// Restore queue state persisted by a previous process.
    ///
    /// Runs left `running` were interrupted and go through the transient
    /// failure path. Runs left `queued` are re-enqueued in creation order.
    ///
    /// # Errors
    /// Returns an error when persisted runs cannot be read.
    #[instrument(skip(self))]
    pub async fn recover_on_startup(&self) -> Result<usize> {
        let inner = &self.inner;
        let interrupted = inner.runs.find_by_status(SyncStatus::Running).await?;
        let queued = inner.runs.find_by_status(SyncStatus::Queued).await?;

        let mut state = inner.state.lock().await;
        for run in &interrupted {
            if state.contains(run.id) {
                continue;
            }
            warn!(run_id = %run.id, kind = %run.kind, "Run interrupted by restart");
            let failure = IntegrationError::Transient("interrupted by process restart".into());
            let disposition = inner.decide(run, &failure);
            inner.persist_disposition(run.id, disposition).await;
        }

        let mut restored = 0;
        for run in queued {
            if state.contains(run.id) {
                continue;
            }
            state.queue.push_back(SyncQueueEntry {
                kind: run.kind,
                triggered_by: run.triggered_by,
                run_id: run.id,
            });
            restored += 1;
        }

        inner.advance_locked(&mut state).await;
        info!(interrupted = interrupted.len(), restored, "Recovered sync queue");
        Ok(restored)
    }

    /// Wait until no run holds the lock and the queue is empty, or until
    /// `timeout` passes. Returns true when idle.
    pub async fn wait_until_idle(&self, timeout: StdDuration) -> bool {
        let poll = async {
            loop {
                {
                    let state = self.inner.state.lock().await;
                    if !state.lock.is_held() && state.queue.is_empty() {
                        return;
                    }
                }
                tokio::time::sleep(StdDuration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Recent run history, newest first.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub async fn history(&self, limit: u32) -> Result<Vec<SyncRun>> {
        self.inner.runs.list_recent(limit).await
    }
}

impl Inner {
    fn spawn_run(self: &Arc<Self>, owner: LockOwner) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.drive(owner).await });
    }

    /// Execute one run, record its outcome, then release the lock and
    /// advance the queue. The release happens on every path.
    async fn drive(self: Arc<Self>, owner: LockOwner) {
        let executor = Arc::clone(&self.executor);
        let kind = owner.kind;
        let outcome = match tokio::spawn(async move { executor.execute(kind).await }).await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(run_id = %owner.run_id, error = %join_err, "Sync task aborted");
                Err(IntegrationError::Transient(format!("sync task aborted: {join_err}")))
            }
        };

        let pause_until = match &outcome {
            Err(IntegrationError::RateLimited { retry_after, .. }) => {
                let window = retry_after
                    .and_then(|after| Duration::from_std(after).ok())
                    .unwrap_or(self.config.rate_limit_cooldown);
                Some(later(self.clock.now(), window))
            }
            _ => None,
        };

        self.finish(owner, outcome, pause_until).await;
        self.release_and_advance(pause_until).await;
    }

    async fn finish(
        &self,
        owner: LockOwner,
        outcome: std::result::Result<SyncCounts, IntegrationError>,
        pause_until: Option<DateTime<Utc>>,
    ) {
        let disposition = match outcome {
            Ok(counts) => RunDisposition::Completed(counts),
            Err(err) => {
                let run = match self.runs.get(owner.run_id).await {
                    Ok(Some(run)) => run,
                    Ok(None) => {
                        error!(run_id = %owner.run_id, "Finished run missing from history");
                        return;
                    }
                    Err(load_err) => {
                        error!(run_id = %owner.run_id, error = %load_err, "Failed to load run");
                        return;
                    }
                };
                match (&err, pause_until) {
                    (IntegrationError::RateLimited { .. }, Some(until)) => {
                        warn!(
                            run_id = %owner.run_id,
                            paused_until = %until,
                            "Rate limited by ERP, pausing all syncs"
                        );
                        RunDisposition::Retry {
                            retry_count: run.retry_count,
                            next_retry_at: until,
                            triggered_by: TriggeredBy::Scheduled,
                            error: truncate_reason(&err.to_string()),
                        }
                    }
                    _ => self.decide(&run, &err),
                }
            }
        };

        self.persist_disposition(owner.run_id, disposition).await;
    }

    /// Backoff decision for a non-rate-limit failure.
    fn decide(&self, run: &SyncRun, err: &IntegrationError) -> RunDisposition {
        let message = truncate_reason(&err.to_string());
        if !err.is_retryable() {
            return RunDisposition::Failed(message);
        }
        if run.has_retry_budget() {
            let delay = self.config.backoff(run.retry_count);
            RunDisposition::Retry {
                retry_count: run.retry_count + 1,
                next_retry_at: later(self.clock.now(), delay),
                triggered_by: run.triggered_by,
                error: message,
            }
        } else {
            RunDisposition::Failed(message)
        }
    }

    async fn persist_disposition(&self, run_id: Uuid, disposition: RunDisposition) {
        let now = self.clock.now();
        let result = match disposition {
            RunDisposition::Completed(counts) => {
                info!(run_id = %run_id, synced = counts.synced, errors = counts.errors, "Sync run completed");
                self.runs.complete(run_id, counts, now).await
            }
            RunDisposition::Retry { retry_count, next_retry_at, triggered_by, error } => {
                warn!(
                    run_id = %run_id,
                    retry_count,
                    next_retry_at = %next_retry_at,
                    error = %error,
                    "Sync run scheduled for retry"
                );
                self.runs.schedule_retry(run_id, retry_count, next_retry_at, triggered_by, &error).await
            }
            RunDisposition::Failed(error) => {
                error!(run_id = %run_id, error = %error, "Sync run failed permanently");
                self.runs.fail(run_id, &error, now).await
            }
        };

        if let Err(err) = result {
            error!(run_id = %run_id, error = %err, "Failed to persist sync run outcome");
        }
    }

    async fn release_and_advance(self: &Arc<Self>, pause_until: Option<DateTime<Utc>>) {
        let mut state = self.state.lock().await;
        if let Some(until) = pause_until {
            state.paused_until = Some(state.paused_until.map_or(until, |current| current.max(until)));
        }
        if let Some(owner) = state.lock.release() {
            debug!(run_id = %owner.run_id, "Sync lock released");
        }
        self.advance_locked(&mut state).await;
    }

    /// Start the head of the queue if the lock is free and no pause is
    /// active. Called with the state mutex held.
    async fn advance_locked(self: &Arc<Self>, state: &mut OrchestratorState) {
        let now = self.clock.now();
        state.lift_expired_pause(now);

        while !state.lock.is_held() && !state.is_paused(now) {
            let Some(entry) = state.queue.pop_front() else {
                return;
            };

            if let Err(err) = self.runs.mark_running(entry.run_id, now).await {
                // Stays `queued` in storage; startup recovery picks it up.
                error!(run_id = %entry.run_id, error = %err, "Failed to start queued run");
                continue;
            }

            let owner = LockOwner { run_id: entry.run_id, kind: entry.kind, started_at: now };
            state.lock.try_acquire(owner);
            info!(run_id = %entry.run_id, kind = %entry.kind, "Queued sync run started");
            self.spawn_run(owner);
        }
    }
}

/// Bound stored error messages.
fn truncate_reason(reason: &str) -> String {
    if reason.len() <= MAX_ERROR_MESSAGE_LEN {
        return reason.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &reason[..end])
}
