//! Bling webhook receiver and delivery history

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;
use stocksync_domain::WebhookEvent;
use tracing::debug;

use super::{ApiError, AppState, HistoryQuery};

/// `POST /webhooks/bling`
///
/// The raw body is verified as received. Side effects run on a spawned task
/// after the response has been produced.
pub async fn receive_bling(
    State(ctx): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(ctx.config.webhook.signature_header.as_str())
        .and_then(|value| value.to_str().ok());

    let receipt = ctx.webhooks.receive(&body, signature).await;

    if let Some(deferred) = receipt.deferred {
        let pipeline = Arc::clone(&ctx.webhooks);
        tokio::spawn(async move {
            let outcome = pipeline.process(deferred).await;
            debug!(outcome = ?outcome, "Webhook processing finished");
        });
    }

    let status = StatusCode::from_u16(receipt.response.status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(receipt.response.body()))
}

/// `GET /api/webhooks/events?limit=`
pub async fn list_events(
    State(ctx): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<WebhookEvent>>, ApiError> {
    Ok(Json(ctx.webhooks.history(query.effective_limit()).await?))
}
