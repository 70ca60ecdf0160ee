//! Error types used throughout the application

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for StockSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum StockSyncError {
    /// Storage failure
    #[error("Database error: {0}")]
    Database(String),

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure talking to a remote service
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials missing or rejected
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied a malformed value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected failure inside the service
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for StockSync operations
pub type Result<T> = std::result::Result<T, StockSyncError>;

/// Failure taxonomy of the integration subsystem.
///
/// The orchestrator decides between a global pause, a timed retry and a
/// terminal failure purely from the variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    /// The ERP reported the integration is over quota. Pauses all syncs and
    /// does not consume the run's retry budget.
    #[error("Rate limited by ERP: {message}")]
    RateLimited {
        /// Vendor message
        message: String,
        /// Vendor `Retry-After`, when sent
        retry_after: Option<Duration>,
    },

    /// Retried with exponential backoff up to the run's retry budget.
    #[error("Transient integration error: {0}")]
    Transient(String),

    /// Refresh token rejected. The integration is disabled until an operator
    /// re-authorizes it.
    #[error("Permanent credential error: {0}")]
    PermanentCredential(String),

    /// Inbound webhook signature missing or wrong.
    #[error("Webhook authentication failed: {0}")]
    AuthenticationFailure(String),

    /// Webhook side effect failed. Recorded on the event, never retried here.
    #[error("Webhook handler error: {0}")]
    Handler(String),
}

impl IntegrationError {
    /// Short machine-readable label used in logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::Transient(_) => "transient",
            Self::PermanentCredential(_) => "permanent_credential",
            Self::AuthenticationFailure(_) => "authentication_failure",
            Self::Handler(_) => "handler",
        }
    }

    /// Whether an orchestrated run hitting this error may run again.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }
}

/// Typed error surfaced by the remote ERP API client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErpApiError {
    /// HTTP 429
    #[error("Rate limited (HTTP 429): {message}")]
    RateLimited {
        /// Response body or reason
        message: String,
        /// Parsed `Retry-After`, in seconds
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success status
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason
        message: String,
    },

    /// Connection-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// The request exceeded its timeout
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// No usable access token. `permanent` is set when the refresh token was
    /// rejected and the integration has been deactivated.
    #[error("Credential unavailable: {message}")]
    Credential {
        /// Why no token is available
        message: String,
        /// Set once the integration is deactivated
        permanent: bool,
    },

    /// Body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Client could not be built from its configuration
    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ErpApiError {
    /// HTTP status carried by the error, if any.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for HTTP 429.
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

impl From<ErpApiError> for IntegrationError {
    fn from(err: ErpApiError) -> Self {
        match err {
            ErpApiError::RateLimited { message, retry_after_secs } => Self::RateLimited {
                message,
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            ErpApiError::Credential { message, permanent: true } => {
                Self::PermanentCredential(message)
            }
            other => Self::Transient(other.to_string()),
        }
    }
}

/// Outcome classification of an OAuth refresh attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenRefreshError {
    /// The refresh token itself was rejected (`invalid_grant` class).
    #[error("Refresh token rejected: {0}")]
    Permanent(String),

    /// Network failure, timeout, 5xx, or anything that may succeed later.
    #[error("Token refresh failed: {0}")]
    Transient(String),
}

impl TokenRefreshError {
    /// True when the refresh token itself was rejected.
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Why a valid access token could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// No credential has been stored yet
    #[error("ERP integration is not configured")]
    NotConfigured,

    /// Deactivated after a rejected refresh token
    #[error("ERP integration is inactive; re-authorization required")]
    Inactive,

    /// The refresh attempt failed
    #[error(transparent)]
    Refresh(#[from] TokenRefreshError),

    /// Reading or writing the credential failed
    #[error("Credential store error: {0}")]
    Store(String),
}

impl From<TokenError> for ErpApiError {
    fn from(err: TokenError) -> Self {
        let permanent = matches!(
            err,
            TokenError::Inactive | TokenError::Refresh(TokenRefreshError::Permanent(_))
        );
        Self::Credential { message: err.to_string(), permanent }
    }
}

impl From<StockSyncError> for IntegrationError {
    fn from(err: StockSyncError) -> Self {
        Self::Transient(err.to_string())
    }
}
