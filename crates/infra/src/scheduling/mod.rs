//! Cron-driven background jobs
//!
//! - [`SyncScheduler`]: periodic full sync
//! - [`ReconcileScheduler`]: retry and pause sweep
//! - [`TokenRenewalScheduler`]: proactive OAuth renewal
//!
//! All of them share the start/stop lifecycle in `cron_job`.

mod cron_job;
pub mod error;
pub mod reconcile_scheduler;
pub mod sync_scheduler;
pub mod token_renewal_scheduler;

pub use cron_job::SchedulerConfig;
pub use error::{SchedulerError, SchedulerResult};
pub use reconcile_scheduler::ReconcileScheduler;
pub use sync_scheduler::SyncScheduler;
pub use token_renewal_scheduler::TokenRenewalScheduler;
