//! SQLite implementation of the webhook event log.
//!
//! `event_id` is the primary key, so concurrent deliveries of one event
//! race on the insert and exactly one of them wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use stocksync_core::webhook::WebhookEventRepository;
use stocksync_domain::{Result, WebhookEvent};

use super::manager::DbManager;
use super::sql::{opt_ts, parse_opt_ts, parse_ts, ts, with_connection};

const EVENT_COLUMNS: &str =
    "event_id, resource, action, payload, processed, processed_at, error, received_at";

/// SQLite-backed [`WebhookEventRepository`].
pub struct SqliteWebhookEventRepository {
    db: Arc<DbManager>,
}

impl SqliteWebhookEventRepository {
    /// Repository over `db`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WebhookEventRepository for SqliteWebhookEventRepository {
    async fn exists(&self, event_id: &str) -> Result<bool> {
        let event_id = event_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM webhook_events WHERE event_id = ?1)",
                params![event_id],
                |row| row.get::<_, bool>(0),
            )
        })
        .await
    }

    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool> {
        let event = event.clone();
        let inserted = with_connection(&self.db, move |conn| {
            conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO webhook_events ({EVENT_COLUMNS}) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ),
                params![
                    event.event_id,
                    event.resource,
                    event.action,
                    event.payload,
                    event.processed,
                    opt_ts(event.processed_at),
                    event.error,
                    ts(event.received_at),
                ],
            )
        })
        .await?;
        Ok(inserted == 1)
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        error: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool> {
        let event_id = event_id.to_string();
        let error = error.map(str::to_string);
        let changed = with_connection(&self.db, move |conn| {
            conn.execute(
                "UPDATE webhook_events SET processed = 1, processed_at = ?2, error = ?3 \
                 WHERE event_id = ?1 AND processed = 0",
                params![event_id, ts(processed_at), error],
            )
        })
        .await?;
        Ok(changed == 1)
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        let event_id = event_id.to_string();
        with_connection(&self.db, move |conn| {
            conn.query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM webhook_events WHERE event_id = ?1"),
                params![event_id],
                map_event_row,
            )
            .optional()
        })
        .await
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<WebhookEvent>> {
        with_connection(&self.db, move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {EVENT_COLUMNS} FROM webhook_events \
                 ORDER BY received_at DESC, event_id DESC LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], map_event_row)?;
            rows.collect()
        })
        .await
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<WebhookEvent> {
    let received_at: String = row.get(7)?;
    Ok(WebhookEvent {
        event_id: row.get(0)?,
        resource: row.get(1)?,
        action: row.get(2)?,
        payload: row.get(3)?,
        processed: row.get(4)?,
        processed_at: parse_opt_ts(5, row.get(5)?)?,
        error: row.get(6)?,
        received_at: parse_ts(7, &received_at)?,
    })
}
