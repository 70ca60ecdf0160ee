//! Database implementations

pub mod catalog_repository;
pub mod credential_repository;
pub mod manager;
mod sql;
pub mod sync_run_repository;
pub mod webhook_event_repository;

pub use catalog_repository::SqliteCatalogStore;
pub use credential_repository::SqliteCredentialStore;
pub use manager::DbManager;
pub use sync_run_repository::SqliteSyncRunRepository;
pub use webhook_event_repository::SqliteWebhookEventRepository;
