//! HTTP routes

mod error;
pub mod health;
pub mod sync;
pub mod webhooks;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use stocksync_domain::constants::{DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT};

pub use error::ApiError;

use crate::AppContext;

/// Shared state handed to every handler.
pub type AppState = Arc<AppContext>;

/// All routes of the server.
pub fn router(ctx: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/webhooks/bling", post(webhooks::receive_bling))
        .route("/api/webhooks/events", get(webhooks::list_events))
        .route("/api/sync", post(sync::trigger_sync))
        .route("/api/sync/status", get(sync::sync_status))
        .route("/api/sync/runs", get(sync::list_runs))
        .with_state(ctx)
}

/// `?limit=` for history listings.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// Requested page size
    pub limit: Option<u32>,
}

impl HistoryQuery {
    /// Requested limit clamped to `1..=MAX_HISTORY_LIMIT`.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT)
    }
}
