//! Sync run history and orchestration state

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_MAX_RETRIES;
use crate::errors::StockSyncError;

/// What a sync run pulls from the ERP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Product catalog pages
    Products,
    /// Stock balances of every known product
    Inventory,
    /// Sales orders inside the lookback window
    Sales,
    /// Product-supplier links
    Suppliers,
    /// products, then inventory, then sales
    Full,
}

impl SyncKind {
    /// Wire and storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Inventory => "inventory",
            Self::Sales => "sales",
            Self::Suppliers => "suppliers",
            Self::Full => "full",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncKind {
    type Err = StockSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "inventory" => Ok(Self::Inventory),
            "sales" => Ok(Self::Sales),
            "suppliers" => Ok(Self::Suppliers),
            "full" => Ok(Self::Full),
            other => Err(StockSyncError::InvalidInput(format!("unknown sync kind: {other}"))),
        }
    }
}

/// Lifecycle state of a [`SyncRun`].
///
/// `queued -> running -> {completed | failed | retrying}`, and
/// `retrying -> queued` when the retry comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Waiting for the lock
    Queued,
    /// Holding the lock
    Running,
    /// Finished successfully
    Completed,
    /// Finished after a permanent error or an exhausted retry budget
    Failed,
    /// Waiting for `next_retry_at`
    Retrying,
}

impl SyncStatus {
    /// Wire and storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
        }
    }

    /// No further transitions happen from a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = StockSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "retrying" => Ok(Self::Retrying),
            other => Err(StockSyncError::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// Origin of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    /// Operator request
    Manual,
    /// Cron trigger or a requeued retry
    Scheduled,
    /// Requested by an inbound webhook
    Webhook,
}

impl TriggeredBy {
    /// Wire and storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggeredBy {
    type Err = StockSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(Self::Manual),
            "scheduled" => Ok(Self::Scheduled),
            "webhook" => Ok(Self::Webhook),
            other => Err(StockSyncError::InvalidInput(format!("unknown trigger: {other}"))),
        }
    }
}

/// One execution attempt of a sync job, persisted as an append-only audit
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRun {
    /// Time-ordered (v7) run id
    pub id: Uuid,
    /// What the run pulls
    pub kind: SyncKind,
    /// Current lifecycle state
    pub status: SyncStatus,
    /// Origin of the request
    pub triggered_by: TriggeredBy,
    /// Entities written
    pub items_synced: u64,
    /// Entities that failed mapping or storage
    pub items_errors: u64,
    /// Set when the run first takes the lock
    pub started_at: Option<DateTime<Utc>>,
    /// Set on a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Transient failures retried so far
    pub retry_count: u32,
    /// Retry budget
    pub max_retries: u32,
    /// When a `retrying` run becomes due
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Last failure, truncated
    pub error_message: Option<String>,
    /// Insertion time; orders queue recovery
    pub created_at: DateTime<Utc>,
}

impl SyncRun {
    /// A fresh run in `status`. `started_at` is set when it begins running.
    pub fn new(
        id: Uuid,
        kind: SyncKind,
        triggered_by: TriggeredBy,
        status: SyncStatus,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            status,
            triggered_by,
            items_synced: 0,
            items_errors: 0,
            started_at: (status == SyncStatus::Running).then_some(now),
            completed_at: None,
            retry_count: 0,
            max_retries,
            next_retry_at: None,
            error_message: None,
            created_at: now,
        }
    }

    /// Budget applied to new runs when none is configured.
    pub fn default_max_retries() -> u32 {
        DEFAULT_MAX_RETRIES
    }

    /// Whether another transient failure may still be retried.
    pub const fn has_retry_budget(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Items processed by a sub-sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    /// Entities written
    pub synced: u64,
    /// Entities skipped after a per-item failure
    pub errors: u64,
}

impl SyncCounts {
    /// Counts from raw totals.
    pub const fn new(synced: u64, errors: u64) -> Self {
        Self { synced, errors }
    }
}

impl Add for SyncCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self { synced: self.synced + rhs.synced, errors: self.errors + rhs.errors }
    }
}

impl AddAssign for SyncCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A run waiting for the lock. Consumed on dequeue, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    /// What the run pulls
    pub kind: SyncKind,
    /// Origin of the request
    pub triggered_by: TriggeredBy,
    /// Persisted run this entry drives
    pub run_id: Uuid,
}

/// Holder of the sync lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockOwner {
    /// Run holding the lock
    pub run_id: Uuid,
    /// What it pulls
    pub kind: SyncKind,
    /// When it took the lock
    pub started_at: DateTime<Utc>,
}

/// Process-wide mutual exclusion for orchestrated runs. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncLock {
    owner: Option<LockOwner>,
}

impl SyncLock {
    /// Whether a run currently holds the lock.
    pub const fn is_held(&self) -> bool {
        self.owner.is_some()
    }

    /// Current holder, if any.
    pub const fn owner(&self) -> Option<&LockOwner> {
        self.owner.as_ref()
    }

    /// Take the lock for `owner`. Returns false if it is already held.
    pub fn try_acquire(&mut self, owner: LockOwner) -> bool {
        if self.owner.is_some() {
            return false;
        }
        self.owner = Some(owner);
        true
    }

    /// Release the lock, returning the previous owner.
    pub fn release(&mut self) -> Option<LockOwner> {
        self.owner.take()
    }
}

/// Answer to a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestOutcome {
    /// Persisted run created for the request
    pub run_id: Uuid,
    /// True when the run waits behind another
    pub queued: bool,
    /// 1-based position in the wait queue, 0 when the run started at once.
    pub queue_position: usize,
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusSnapshot {
    /// A run holds the lock
    pub locked: bool,
    /// Holder of the lock
    pub current_run: Option<LockOwner>,
    /// Runs waiting behind it
    pub queue_depth: usize,
    /// End of an active rate-limit pause
    pub paused_until: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_strings() {
        for kind in [
            SyncKind::Products,
            SyncKind::Inventory,
            SyncKind::Sales,
            SyncKind::Suppliers,
            SyncKind::Full,
        ] {
            assert_eq!(kind.as_str().parse::<SyncKind>().unwrap(), kind);
        }
        assert!("orders".parse::<SyncKind>().is_err());
    }

    #[test]
    fn lock_rejects_second_owner() {
        let mut lock = SyncLock::default();
        let owner =
            LockOwner { run_id: Uuid::now_v7(), kind: SyncKind::Products, started_at: Utc::now() };

        assert!(lock.try_acquire(owner));
        assert!(!lock.try_acquire(LockOwner { run_id: Uuid::now_v7(), ..owner }));
        assert_eq!(lock.release(), Some(owner));
        assert!(!lock.is_held());
    }

    #[test]
    fn new_running_run_records_start() {
        let now = Utc::now();
        let run = SyncRun::new(
            Uuid::now_v7(),
            SyncKind::Full,
            TriggeredBy::Manual,
            SyncStatus::Running,
            3,
            now,
        );
        assert_eq!(run.started_at, Some(now));
        assert!(run.has_retry_budget());

        let queued = SyncRun::new(
            Uuid::now_v7(),
            SyncKind::Full,
            TriggeredBy::Manual,
            SyncStatus::Queued,
            3,
            now,
        );
        assert!(queued.started_at.is_none());
    }

    #[test]
    fn counts_sum() {
        let mut total = SyncCounts::new(3, 1);
        total += SyncCounts::new(4, 0);
        assert_eq!(total, SyncCounts::new(7, 1));
    }

    #[test]
    fn status_snapshot_serializes_camel_case() {
        let snapshot =
            SyncStatusSnapshot { locked: false, current_run: None, queue_depth: 2, paused_until: None };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["queueDepth"], 2);
        assert_eq!(json["locked"], false);
    }
}
