//! # StockSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite repositories for sync runs, webhook events, credentials and the
//!   local catalog mirror
//! - The Bling REST client and OAuth token refresher
//! - Operator notifiers (email relay, log-only)
//! - Cron schedulers for scheduled syncs, retry reconciliation and token
//!   renewal
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `stocksync-core`
//! - Depends on `stocksync-common` and `stocksync-domain`
//! - Contains all "impure" code (database, network, timers)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod notifications;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteCatalogStore, SqliteCredentialStore, SqliteSyncRunRepository,
    SqliteWebhookEventRepository,
};
pub use errors::InfraError;
pub use http::HttpClient;
pub use integrations::bling::{BlingClient, BlingTokenRefresher};
pub use notifications::{notifier_from_config, EmailRelayNotifier, LogNotifier};
pub use scheduling::{
    ReconcileScheduler, SchedulerError, SchedulerResult, SyncScheduler, TokenRenewalScheduler,
};
