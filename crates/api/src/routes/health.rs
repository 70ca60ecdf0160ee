//! Liveness and readiness report.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use stocksync_domain::SyncStatusSnapshot;
use tracing::warn;

use super::AppState;
use crate::utils::health::HealthStatus;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Component checks and overall score
    #[serde(flatten)]
    pub status: HealthStatus,
    /// False once the refresh token was rejected; syncs are skipped until
    /// an operator re-authorises.
    pub integration_active: Option<bool>,
    /// Current sync state
    pub sync: SyncStatusSnapshot,
}

/// `GET /health`: 200 when healthy, 503 otherwise.
pub async fn health(State(ctx): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let status = ctx.health_check().await;
    let integration_active = match ctx.tokens.is_active().await {
        Ok(active) => Some(active),
        Err(err) => {
            warn!(error = %err, "Could not read credential state for health check");
            None
        }
    };
    let sync = ctx.orchestrator.get_status().await;

    let code = if status.is_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(HealthReport { status, integration_active, sync }))
}
