//! SQLite implementation of the sync run history.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use stocksync_core::sync::SyncRunRepository;
use stocksync_domain::{
    Result, StockSyncError, SyncCounts, SyncRun, SyncStatus, TriggeredBy,
};
use uuid::Uuid;

use super::manager::DbManager;
use super::sql::{
    from_sql_count, opt_ts, parse_opt_ts, parse_text, parse_ts, to_sql_count, ts, with_connection,
};

const RUN_COLUMNS: &str = "id, kind, status, triggered_by, items_synced, items_errors, started_at, \
     completed_at, retry_count, max_retries, next_retry_at, error_message, created_at";

/// SQLite-backed [`SyncRunRepository`].
pub struct SqliteSyncRunRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRunRepository {
    /// Repository over `db`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Apply a status transition and fail with `NotFound` when no row matched.
    async fn update_one<F>(&self, id: Uuid, op: F) -> Result<()>
    where
        F: FnOnce(&rusqlite::Connection, &str) -> rusqlite::Result<usize> + Send + 'static,
    {
        let changed =
            with_connection(&self.db, move |conn| op(conn, &id.to_string())).await?;
        if changed == 0 {
            return Err(StockSyncError::NotFound(format!("sync run {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl SyncRunRepository for SqliteSyncRunRepository {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        let run = run.clone();
        with_connection(&self.db, move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO sync_runs ({RUN_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    run.id.to_string(),
                    run.kind.as_str(),
                    run.status.as_str(),
                    run.triggered_by.as_str(),
                    to_sql_count(run.items_synced),
                    to_sql_count(run.items_errors),
                    opt_ts(run.started_at),
                    opt_ts(run.completed_at),
                    run.retry_count,
                    run.max_retries,
                    opt_ts(run.next_retry_at),
                    run.error_message,
                    ts(run.created_at),
                ],
            )
        })
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncRun>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?1"),
                params![id.to_string()],
                map_run_row,
            )
            .optional()
        })
        .await
    }

    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        self.update_one(id, move |conn, id| {
            conn.execute(
                "UPDATE sync_runs SET status = 'running', started_at = ?2, next_retry_at = NULL \
                 WHERE id = ?1",
                params![id, ts(started_at)],
            )
        })
        .await
    }

    async fn mark_queued(&self, id: Uuid) -> Result<bool> {
        let changed = with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE sync_runs SET status = 'queued' WHERE id = ?1 AND status = 'retrying'",
                params![id.to_string()],
            )
        })
        .await?;
        Ok(changed > 0)
    }

    async fn complete(&self, id: Uuid, counts: SyncCounts, completed_at: DateTime<Utc>) -> Result<()> {
        self.update_one(id, move |conn, id| {
            conn.execute(
                "UPDATE sync_runs SET status = 'completed', items_synced = ?2, items_errors = ?3, \
                 completed_at = ?4, next_retry_at = NULL, error_message = NULL WHERE id = ?1",
                params![
                    id,
                    to_sql_count(counts.synced),
                    to_sql_count(counts.errors),
                    ts(completed_at)
                ],
            )
        })
        .await
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
        triggered_by: TriggeredBy,
        error: &str,
    ) -> Result<()> {
        let error = error.to_string();
        self.update_one(id, move |conn, id| {
            conn.execute(
                "UPDATE sync_runs SET status = 'retrying', retry_count = ?2, next_retry_at = ?3, \
                 triggered_by = ?4, error_message = ?5 WHERE id = ?1",
                params![id, retry_count, ts(next_retry_at), triggered_by.as_str(), error],
            )
        })
        .await
    }

    async fn fail(&self, id: Uuid, error: &str, completed_at: DateTime<Utc>) -> Result<()> {
        let error = error.to_string();
        self.update_one(id, move |conn, id| {
            conn.execute(
                "UPDATE sync_runs SET status = 'failed', error_message = ?2, completed_at = ?3, \
                 next_retry_at = NULL WHERE id = ?1",
                params![id, error, ts(completed_at)],
            )
        })
        .await
    }

    async fn find_due_retries(&self, now: DateTime<Utc>) -> Result<Vec<SyncRun>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs \
                 WHERE status = 'retrying' AND next_retry_at <= ?1 \
                 ORDER BY next_retry_at ASC, created_at ASC"
            ))?;
            let rows = stmt.query_map(params![ts(now)], map_run_row)?;
            rows.collect()
        })
        .await
    }

    async fn find_by_status(&self, status: SyncStatus) -> Result<Vec<SyncRun>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs WHERE status = ?1 ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt.query_map(params![status.as_str()], map_run_row)?;
            rows.collect()
        })
        .await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY created_at DESC, id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], map_run_row)?;
            rows.collect()
        })
        .await
    }
}

fn map_run_row(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let status: String = row.get(2)?;
    let triggered_by: String = row.get(3)?;
    let created_at: String = row.get(12)?;

    Ok(SyncRun {
        id: parse_text(0, &id)?,
        kind: parse_text(1, &kind)?,
        status: parse_text(2, &status)?,
        triggered_by: parse_text(3, &triggered_by)?,
        items_synced: from_sql_count(row.get(4)?),
        items_errors: from_sql_count(row.get(5)?),
        started_at: parse_opt_ts(6, row.get(6)?)?,
        completed_at: parse_opt_ts(7, row.get(7)?)?,
        retry_count: row.get(8)?,
        max_retries: row.get(9)?,
        next_retry_at: parse_opt_ts(10, row.get(10)?)?,
        error_message: row.get(11)?,
        created_at: parse_ts(12, &created_at)?,
    })
}
