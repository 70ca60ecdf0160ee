//! Tracing initialisation and logging helpers

use anyhow::anyhow;
use stocksync_domain::{LogFormat, StockSyncError};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `info`.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    }
    .map_err(|err| anyhow!("failed to initialise tracing: {err}"))
}

/// Stable label for an error, used as a structured log field.
#[inline]
pub fn error_label(error: &StockSyncError) -> &'static str {
    match error {
        StockSyncError::Database(_) => "database",
        StockSyncError::Config(_) => "config",
        StockSyncError::Network(_) => "network",
        StockSyncError::Auth(_) => "auth",
        StockSyncError::NotFound(_) => "not_found",
        StockSyncError::InvalidInput(_) => "invalid_input",
        StockSyncError::Internal(_) => "internal",
    }
}
