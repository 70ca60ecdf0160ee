//! Orchestrated synchronization with the ERP

pub mod jobs;
pub mod orchestrator;
pub mod ports;

pub use jobs::{BlingSyncExecutor, SyncJobConfig};
pub use orchestrator::{OrchestratorConfig, ReconcileReport, SyncOrchestrator};
pub use ports::{SyncExecutor, SyncRunRepository};
