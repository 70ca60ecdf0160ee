//! Operator notifiers
//!
//! Delivery is fire-and-forget: failures are logged here and never reach
//! the token lifecycle manager.

pub mod email_relay;
pub mod log;

use std::sync::Arc;

pub use email_relay::EmailRelayNotifier;
pub use log::LogNotifier;
use stocksync_core::notification_ports::Notifier;
use stocksync_domain::NotificationConfig;
use tracing::warn;

/// Email relay when one is configured, otherwise log-only.
pub fn notifier_from_config(config: &NotificationConfig) -> Arc<dyn Notifier> {
    let Some(relay_url) = config.relay_url.as_deref().filter(|url| !url.trim().is_empty()) else {
        return Arc::new(LogNotifier);
    };

    match EmailRelayNotifier::new(relay_url, config.recipient.clone()) {
        Ok(notifier) => Arc::new(notifier),
        Err(err) => {
            warn!(error = %err, "Email relay unavailable, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    }
}
