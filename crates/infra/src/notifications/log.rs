//! Log-only notifier used when no relay is configured.

use async_trait::async_trait;
use stocksync_core::notification_ports::{NotificationSeverity, Notifier, OperatorNotification};
use tracing::{error, warn};

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &OperatorNotification) {
        match notification.severity {
            NotificationSeverity::Critical => error!(
                subject = %notification.subject,
                body = %notification.body,
                "Operator notification"
            ),
            NotificationSeverity::Warning => warn!(
                subject = %notification.subject,
                body = %notification.body,
                "Operator notification"
            ),
        }
    }
}
