//! Operator notification port

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How urgently the operator should act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    /// Degraded but self-healing
    Warning,
    /// Needs operator action
    Critical,
}

impl fmt::Display for NotificationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// Message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorNotification {
    /// Urgency
    pub severity: NotificationSeverity,
    /// One-line summary
    pub subject: String,
    /// Details
    pub body: String,
}

/// Fire-and-forget delivery. Implementations log their own failures.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `notification`
    async fn notify(&self, notification: &OperatorNotification);
}
