//! Sync trigger, status and history

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use stocksync_domain::{SyncKind, SyncRequestOutcome, SyncRun, SyncStatusSnapshot, TriggeredBy};
use tracing::info;

use super::{ApiError, AppState, HistoryQuery};

/// Body of `POST /api/sync`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequestBody {
    /// Sync kind name
    pub kind: String,
    /// Free-form origin, recorded on the run
    #[serde(default)]
    pub triggered_by: Option<String>,
}

/// `POST /api/sync`: start or queue a run. Never waits for the run.
pub async fn trigger_sync(
    State(ctx): State<AppState>,
    Json(body): Json<SyncRequestBody>,
) -> Result<(StatusCode, Json<SyncRequestOutcome>), ApiError> {
    let kind: SyncKind = body.kind.parse()?;
    let triggered_by = match body.triggered_by.as_deref() {
        Some(value) => value.parse()?,
        None => TriggeredBy::Manual,
    };

    let outcome = ctx.orchestrator.request_sync(kind, triggered_by).await?;
    info!(
        run_id = %outcome.run_id,
        kind = kind.as_str(),
        queued = outcome.queued,
        "Sync requested over HTTP"
    );
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// `GET /api/sync/status`
pub async fn sync_status(State(ctx): State<AppState>) -> Json<SyncStatusSnapshot> {
    Json(ctx.orchestrator.get_status().await)
}

/// `GET /api/sync/runs?limit=`
pub async fn list_runs(
    State(ctx): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SyncRun>>, ApiError> {
    Ok(Json(ctx.orchestrator.history(query.effective_limit()).await?))
}
