//! # StockSync Server
//!
//! HTTP surface and process wiring for the Bling integration:
//!
//! - [`context`]: builds every port implementation and service from
//!   [`stocksync_domain::Config`]
//! - [`routes`]: axum router for the webhook receiver, sync controls,
//!   history and health
//! - [`utils`]: tracing initialisation and health reporting

pub mod context;
pub mod routes;
pub mod utils;

pub use context::{AppContext, BackgroundJobs};
pub use routes::router;
