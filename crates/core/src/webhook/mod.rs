//! Inbound ERP webhook ingestion

pub mod event;
pub mod pipeline;
pub mod ports;
pub mod router;
pub mod signature;

pub use pipeline::{DeferredWebhook, ProcessOutcome, WebhookPipeline, WebhookReceipt, WebhookResponse};
pub use ports::WebhookEventRepository;
pub use router::WebhookRouter;
