//! Port interfaces for webhook ingestion

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_domain::{Result, WebhookEvent};

/// Persisted webhook events, unique by `event_id`.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Whether an event with this id was already received
    async fn exists(&self, event_id: &str) -> Result<bool>;

    /// Insert unless the id is taken. Returns false when another delivery
    /// of the same event won the race.
    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool>;

    /// Record the processing outcome. Only unprocessed events are updated;
    /// returns false when the event was already marked.
    async fn mark_processed(
        &self,
        event_id: &str,
        error: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Event by id
    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>>;

    /// Most recently received first
    async fn list_recent(&self, limit: u32) -> Result<Vec<WebhookEvent>>;
}
