//! Port interfaces for sync orchestration

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_domain::{
    IntegrationError, Result, SyncCounts, SyncKind, SyncRun, SyncStatus, TriggeredBy,
};
use uuid::Uuid;

/// Persisted sync run history.
///
/// Each method is a single atomic write at the storage layer. Runs are never
/// deleted.
#[async_trait]
pub trait SyncRunRepository: Send + Sync {
    /// Insert a new run
    async fn insert(&self, run: &SyncRun) -> Result<()>;

    /// Fetch a run by id
    async fn get(&self, id: Uuid) -> Result<Option<SyncRun>>;

    /// Transition to `running`, clearing any pending retry time
    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()>;

    /// Transition `retrying -> queued` when a retry comes due.
    ///
    /// Returns `false` without writing when the run is no longer `retrying`.
    async fn mark_queued(&self, id: Uuid) -> Result<bool>;

    /// Transition to `completed` with the final counters
    async fn complete(&self, id: Uuid, counts: SyncCounts, completed_at: DateTime<Utc>)
        -> Result<()>;

    /// Transition to `retrying`; the run becomes due at `next_retry_at`
    async fn schedule_retry(
        &self,
        id: Uuid,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
        triggered_by: TriggeredBy,
        error: &str,
    ) -> Result<()>;

    /// Transition to terminal `failed`
    async fn fail(&self, id: Uuid, error: &str, completed_at: DateTime<Utc>) -> Result<()>;

    /// `retrying` runs whose `next_retry_at <= now`, oldest due first
    async fn find_due_retries(&self, now: DateTime<Utc>) -> Result<Vec<SyncRun>>;

    /// Runs in `status`, in creation order
    async fn find_by_status(&self, status: SyncStatus) -> Result<Vec<SyncRun>>;

    /// Most recent runs first
    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>>;
}

/// Executes the ERP-side work of one run.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Run every sub-sync of `kind` and return the merged counts.
    async fn execute(&self, kind: SyncKind) -> std::result::Result<SyncCounts, IntegrationError>;
}
