//! # StockSync Core
//!
//! Integration reliability logic between the local catalog and the Bling
//! ERP. No I/O happens here: storage, HTTP and notifications are reached
//! through the port traits implemented in `stocksync-infra`.
//!
//! - [`sync`]: single-flight orchestrator, FIFO queue, retries and the
//!   ERP sub-syncs it runs
//! - [`webhook`]: signed, idempotent webhook ingestion
//! - [`auth`]: OAuth token renewal and operator alerting

pub mod auth;
pub mod sync;
pub mod webhook;

// Ports shared across modules
pub mod catalog_ports;
pub mod erp_ports;
pub mod notification_ports;

pub use auth::{CredentialStore, RenewalOutcome, TokenLifecycleConfig, TokenLifecycleManager};
pub use catalog_ports::CatalogStore;
pub use erp_ports::{AccessTokenProvider, ErpApi, TokenRefresher};
pub use notification_ports::{NotificationSeverity, Notifier, OperatorNotification};
pub use sync::{
    BlingSyncExecutor, OrchestratorConfig, ReconcileReport, SyncExecutor, SyncJobConfig,
    SyncOrchestrator, SyncRunRepository,
};
pub use webhook::{
    DeferredWebhook, ProcessOutcome, WebhookEventRepository, WebhookPipeline, WebhookReceipt,
    WebhookResponse, WebhookRouter,
};
