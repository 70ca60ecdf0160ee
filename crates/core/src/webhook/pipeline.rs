//! Webhook ingestion pipeline
//!
//! [`WebhookPipeline::receive`] authenticates and deduplicates a delivery
//! and persists it unprocessed. It returns the HTTP answer together with
//! the deferred work; the caller sends the answer first and only then runs
//! [`WebhookPipeline::process`], because the ERP retries deliveries that
//! are not acknowledged quickly.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use stocksync_common::clock::Clock;
use stocksync_domain::constants::MAX_ERROR_MESSAGE_LEN;
use stocksync_domain::{IntegrationError, WebhookEnvelope, WebhookEvent};
use tracing::{debug, error, info, instrument, warn};

use super::event::{event_time, split_event_tag};
use super::ports::WebhookEventRepository;
use super::router::WebhookRouter;
use super::signature;

/// Answer to a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookResponse {
    /// New event stored; processing deferred
    Accepted,
    /// Event id already seen; nothing applied
    Duplicate,
    /// Missing or mismatched signature
    Unauthorized(String),
    /// Missing or malformed body
    BadRequest(String),
    /// No signing secret configured
    Misconfigured,
    /// Storage failure
    Internal(String),
}

impl WebhookResponse {
    /// HTTP status to send back to the ERP.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Accepted | Self::Duplicate => 200,
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Misconfigured | Self::Internal(_) => 500,
        }
    }

    /// JSON body to send back to the ERP.
    pub fn body(&self) -> Value {
        match self {
            Self::Accepted => json!({ "success": true }),
            Self::Duplicate => json!({ "success": true, "duplicate": true }),
            Self::Unauthorized(reason) | Self::BadRequest(reason) => {
                json!({ "success": false, "error": reason })
            }
            Self::Misconfigured => {
                json!({ "success": false, "error": "webhook secret not configured" })
            }
            Self::Internal(_) => json!({ "success": false, "error": "internal error" }),
        }
    }
}

/// Stored event waiting for its side effects.
#[derive(Debug, Clone)]
pub struct DeferredWebhook {
    /// Stored event id
    pub event_id: String,
    /// Resource part of the event name
    pub resource: String,
    /// Action part of the event name
    pub action: String,
    /// Event payload
    pub data: Value,
    /// Event timestamp, used for last-write-wins
    pub event_time: DateTime<Utc>,
}

/// Result of [`WebhookPipeline::receive`].
#[derive(Debug)]
pub struct WebhookReceipt {
    /// What to answer right away
    pub response: WebhookResponse,
    /// Work to run after answering, if any
    pub deferred: Option<DeferredWebhook>,
}

impl WebhookReceipt {
    fn respond(response: WebhookResponse) -> Self {
        Self { response, deferred: None }
    }
}

/// How deferred processing ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Handler succeeded
    Processed,
    /// Handler failed; the error is recorded on the event
    ProcessedWithError(String),
    /// Another worker already recorded an outcome
    AlreadyProcessed,
    /// The outcome could not be stored
    NotRecorded(String),
}

/// Receives ERP webhooks.
///
/// Verifies the signature, stores the event once, and hands back the
/// deferred work so the caller can answer before running side effects.
pub struct WebhookPipeline {
    events: Arc<dyn WebhookEventRepository>,
    router: WebhookRouter,
    clock: Arc<dyn Clock>,
    secret: Option<String>,
}

impl WebhookPipeline {
    /// Pipeline verifying with `secret`. An empty secret counts as unset.
    pub fn new(
        events: Arc<dyn WebhookEventRepository>,
        router: WebhookRouter,
        clock: Arc<dyn Clock>,
        secret: Option<String>,
    ) -> Self {
        let secret = secret.filter(|value| !value.is_empty());
        Self { events, router, clock, secret }
    }

    /// Authenticate, deduplicate and persist a delivery.
    ///
    /// Rejected deliveries are never persisted.
    #[instrument(skip(self, raw_body, signature_header), fields(body_len = raw_body.len()))]
    pub async fn receive(&self, raw_body: &[u8], signature_header: Option<&str>) -> WebhookReceipt {
        let Some(secret) = self.secret.as_deref() else {
            error!("Webhook received but no signing secret is configured");
            return WebhookReceipt::respond(WebhookResponse::Misconfigured);
        };

        if raw_body.iter().all(u8::is_ascii_whitespace) {
            return WebhookReceipt::respond(WebhookResponse::BadRequest("missing body".into()));
        }

        let Some(header) = signature_header.filter(|value| !value.trim().is_empty()) else {
            warn!("Webhook rejected: missing signature");
            return WebhookReceipt::respond(WebhookResponse::Unauthorized(
                "missing signature".into(),
            ));
        };
        if !signature::verify(secret, raw_body, header) {
            warn!("Webhook rejected: signature mismatch");
            return WebhookReceipt::respond(WebhookResponse::Unauthorized(
                "invalid signature".into(),
            ));
        }

        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(err) => {
                return WebhookReceipt::respond(WebhookResponse::BadRequest(format!(
                    "invalid JSON body: {err}"
                )));
            }
        };
        if envelope.event_id.trim().is_empty() {
            return WebhookReceipt::respond(WebhookResponse::BadRequest("missing eventId".into()));
        }

        match self.events.exists(&envelope.event_id).await {
            Ok(true) => {
                info!(event_id = %envelope.event_id, "Duplicate webhook delivery ignored");
                return WebhookReceipt::respond(WebhookResponse::Duplicate);
            }
            Ok(false) => {}
            Err(err) => {
                error!(event_id = %envelope.event_id, error = %err, "Idempotency lookup failed");
                return WebhookReceipt::respond(WebhookResponse::Internal(err.to_string()));
            }
        }

        let received_at = self.clock.now();
        let (resource, action) = split_event_tag(&envelope.event);
        let record = WebhookEvent::received(
            envelope.event_id.clone(),
            resource,
            action,
            raw_body.to_vec(),
            received_at,
        );

        match self.events.insert_if_absent(&record).await {
            Ok(true) => {}
            Ok(false) => {
                info!(event_id = %envelope.event_id, "Concurrent duplicate webhook ignored");
                return WebhookReceipt::respond(WebhookResponse::Duplicate);
            }
            Err(err) => {
                error!(event_id = %envelope.event_id, error = %err, "Failed to persist webhook");
                return WebhookReceipt::respond(WebhookResponse::Internal(err.to_string()));
            }
        }

        debug!(event_id = %record.event_id, event = %envelope.event, "Webhook accepted");
        WebhookReceipt {
            response: WebhookResponse::Accepted,
            deferred: Some(DeferredWebhook {
                event_id: record.event_id,
                resource: record.resource,
                action: record.action,
                event_time: event_time(envelope.date.as_deref(), received_at),
                data: envelope.data,
            }),
        }
    }

    /// Apply a stored event's side effects and record the outcome.
    ///
    /// Handler failures are recorded on the event and not retried.
    #[instrument(skip(self, deferred), fields(event_id = %deferred.event_id, resource = %deferred.resource))]
    pub async fn process(&self, deferred: DeferredWebhook) -> ProcessOutcome {
        let result = self
            .router
            .dispatch(&deferred.resource, &deferred.action, &deferred.data, deferred.event_time)
            .await;

        let error = match &result {
            Ok(()) => None,
            Err(IntegrationError::Handler(message)) => Some(truncate(message)),
            Err(other) => Some(truncate(&other.to_string())),
        };

        let now = self.clock.now();
        match self.events.mark_processed(&deferred.event_id, error.as_deref(), now).await {
            Ok(true) => match error {
                None => {
                    info!("Webhook processed");
                    ProcessOutcome::Processed
                }
                Some(message) => {
                    warn!(error = %message, "Webhook processed with error");
                    ProcessOutcome::ProcessedWithError(message)
                }
            },
            Ok(false) => {
                debug!("Webhook outcome already recorded");
                ProcessOutcome::AlreadyProcessed
            }
            Err(err) => {
                error!(error = %err, "Failed to record webhook outcome");
                ProcessOutcome::NotRecorded(err.to_string())
            }
        }
    }

    /// Recent events, newest first.
    ///
    /// # Errors
    /// Propagates repository failures.
    pub async fn history(&self, limit: u32) -> stocksync_domain::Result<Vec<WebhookEvent>> {
        self.events.list_recent(limit).await
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_LEN).collect()
}
