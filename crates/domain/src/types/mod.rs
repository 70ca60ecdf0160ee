//! Domain types and models

pub mod bling;
pub mod catalog;
pub mod credential;
pub mod sync;
pub mod webhook;

pub use catalog::{DepositStock, Product, ProductSupplier, SalesOrder, StockBalance};
pub use credential::{Credential, CredentialUpdate, TokenGrant};
pub use sync::{
    LockOwner, SyncCounts, SyncKind, SyncLock, SyncQueueEntry, SyncRequestOutcome, SyncRun,
    SyncStatus, SyncStatusSnapshot, TriggeredBy,
};
pub use webhook::{WebhookAction, WebhookEnvelope, WebhookEvent, WebhookResource};
