//! Inbound webhook events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Resource part of a `resource.action` event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookResource {
    /// `product`
    Product,
    /// `stock`
    Stock,
    /// `virtual_stock`
    VirtualStock,
    /// `order` (sales order)
    Order,
    /// `product_supplier`
    ProductSupplier,
}

impl WebhookResource {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Stock => "stock",
            Self::VirtualStock => "virtual_stock",
            Self::Order => "order",
            Self::ProductSupplier => "product_supplier",
        }
    }

    /// Parse a wire name; `None` for unknown resources.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "product" => Some(Self::Product),
            "stock" => Some(Self::Stock),
            "virtual_stock" => Some(Self::VirtualStock),
            "order" => Some(Self::Order),
            "product_supplier" => Some(Self::ProductSupplier),
            _ => None,
        }
    }
}

impl fmt::Display for WebhookResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action part of a `resource.action` event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAction {
    /// `created`
    Created,
    /// `updated`
    Updated,
    /// `deleted`
    Deleted,
}

impl WebhookAction {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        }
    }

    /// Parse a wire name; `None` for unknown actions.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "created" => Some(Self::Created),
            "updated" => Some(Self::Updated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for WebhookAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body delivered by the ERP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    /// Idempotency key
    pub event_id: String,
    /// Event timestamp as sent; drives last-write-wins
    #[serde(default)]
    pub date: Option<String>,
    /// Envelope schema version
    #[serde(default)]
    pub version: Option<serde_json::Value>,
    /// `resource.action` tag
    pub event: String,
    /// Sending company
    #[serde(default)]
    pub company_id: Option<String>,
    /// Resource payload
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Persisted record of one delivered event, keyed by the ERP's `eventId`.
///
/// Written unprocessed on receipt, then mutated exactly once to processed
/// (with or without an error).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// ERP event id, unique
    pub event_id: String,
    /// Resource part of the tag
    pub resource: String,
    /// Action part of the tag
    pub action: String,
    /// Raw body as received
    #[serde(serialize_with = "serialize_payload")]
    pub payload: Vec<u8>,
    /// An outcome has been recorded
    pub processed: bool,
    /// When the outcome was recorded
    pub processed_at: Option<DateTime<Utc>>,
    /// Handler error, when processing failed
    pub error: Option<String>,
    /// Receipt time
    pub received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// A freshly received, unprocessed event.
    pub fn received(
        event_id: impl Into<String>,
        resource: impl Into<String>,
        action: impl Into<String>,
        payload: Vec<u8>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            resource: resource.into(),
            action: action.into(),
            payload,
            processed: false,
            processed_at: None,
            error: None,
            received_at,
        }
    }
}

fn serialize_payload<S: Serializer>(payload: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(payload))
}
