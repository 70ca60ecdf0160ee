//! Health reporting for the `/health` endpoint

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Share of healthy components required for an overall healthy status.
const HEALTHY_THRESHOLD: f64 = 0.8;

/// Aggregated health of the server's components.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Score met the healthy threshold
    pub is_healthy: bool,

    /// healthy components / total components
    pub score: f64,

    /// Individual checks
    pub components: Vec<ComponentHealth>,

    /// When the checks ran
    pub checked_at: DateTime<Utc>,
}

impl HealthStatus {
    /// Healthy with score 1.0 and no components.
    pub fn new(checked_at: DateTime<Utc>) -> Self {
        Self { is_healthy: true, score: 1.0, components: Vec::new(), checked_at }
    }

    /// Append a component check.
    pub fn add_component(mut self, component: ComponentHealth) -> Self {
        self.components.push(component);
        self
    }

    /// Recompute `score` and `is_healthy`. Call after adding components.
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate_score(&mut self) {
        if self.components.is_empty() {
            return;
        }

        let healthy_count = self.components.iter().filter(|c| c.is_healthy).count();

        self.score = healthy_count as f64 / self.components.len() as f64;
        self.is_healthy = self.score >= HEALTHY_THRESHOLD;
    }
}

/// Health of a single component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    /// Component name
    pub name: String,
    /// Check outcome
    pub is_healthy: bool,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    /// Healthy component without a message.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    /// Unhealthy component with its failure reason.
    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }
}
