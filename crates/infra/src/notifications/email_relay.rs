//! Email delivery through an HTTP relay

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use stocksync_core::notification_ports::{NotificationSeverity, Notifier, OperatorNotification};
use tracing::{info, instrument, warn};

use crate::http::{HttpClient, HttpClientError};

const RELAY_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    subject: String,
    text: &'a str,
    severity: NotificationSeverity,
}

/// POSTs each notification as JSON to a relay that sends the email.
pub struct EmailRelayNotifier {
    relay_url: String,
    recipient: Option<String>,
    http_client: HttpClient,
}

impl EmailRelayNotifier {
    /// Notifier posting to `relay_url`, addressed to `recipient` when set.
    pub fn new(relay_url: impl Into<String>, recipient: Option<String>) -> Result<Self, HttpClientError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .max_attempts(2)
            .build()?;
        Ok(Self { relay_url: relay_url.into(), recipient, http_client })
    }
}

#[async_trait]
impl Notifier for EmailRelayNotifier {
    #[instrument(skip_all, fields(severity = %notification.severity))]
    async fn notify(&self, notification: &OperatorNotification) {
        let message = RelayMessage {
            to: self.recipient.as_deref(),
            subject: format!("[StockSync] {}", notification.subject),
            text: &notification.body,
            severity: notification.severity,
        };
        let builder = self.http_client.request(Method::POST, &self.relay_url).json(&message);

        match self.http_client.send(builder).await {
            Ok(response) if response.status().is_success() => {
                info!(subject = %notification.subject, "Operator notification sent");
            }
            Ok(response) => warn!(
                status = response.status().as_u16(),
                subject = %notification.subject,
                "Email relay rejected notification"
            ),
            Err(err) => warn!(
                error = %err,
                subject = %notification.subject,
                "Email relay unreachable, notification dropped"
            ),
        }
    }
}
