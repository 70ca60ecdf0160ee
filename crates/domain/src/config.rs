//! Application configuration structures
//!
//! Loaded by `stocksync-infra::config` from the environment or a JSON/TOML
//! file. Every section except `database` has defaults so a minimal file only
//! names the database path.

use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_RETRY_DELAY_SECS, BLING_API_BASE_URL, BLING_TOKEN_URL, DEFAULT_MAX_RETRIES,
    DEFAULT_PAGE_SIZE, DEFAULT_REQUEST_TIMEOUT_SECS, NOTIFICATION_COOLDOWN_HOURS,
    RATE_LIMIT_COOLDOWN_SECS, RECONCILE_CRON, SALES_LOOKBACK_DAYS, SCHEDULED_SYNC_CRON,
    TOKEN_REFRESH_MARGIN_SECS, TOKEN_RENEWAL_CRON, TOKEN_RENEWAL_WINDOW_HOURS,
    TOKEN_URGENT_THRESHOLD_HOURS, WEBHOOK_SIGNATURE_HEADER,
};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// SQLite file and pool sizing
    pub database: DatabaseConfig,
    /// ERP endpoints and OAuth client
    #[serde(default)]
    pub bling: BlingConfig,
    /// Inbound webhook verification
    #[serde(default)]
    pub webhook: WebhookConfig,
    /// Orchestrator retry policy and cron schedules
    #[serde(default)]
    pub sync: SyncConfig,
    /// Token renewal thresholds
    #[serde(default)]
    pub token: TokenConfig,
    /// Operator alert delivery
    #[serde(default)]
    pub notifications: NotificationConfig,
    /// HTTP listener and log output
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Configuration with defaults everywhere except the database path.
    pub fn with_database_path(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseConfig { path: path.into(), pool_size: default_pool_size() },
            bling: BlingConfig::default(),
            webhook: WebhookConfig::default(),
            sync: SyncConfig::default(),
            token: TokenConfig::default(),
            notifications: NotificationConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

/// SQLite database settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path of the database file, created on first start.
    pub path: String,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Remote ERP endpoints and OAuth client settings.
///
/// `client_id`, `client_secret` and `refresh_token` only seed the credential
/// store on first start; afterwards the stored credential is authoritative.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlingConfig {
    /// Base URL of the REST API, without trailing slash.
    pub api_base_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// OAuth client id.
    pub client_id: Option<String>,
    /// OAuth client secret.
    pub client_secret: Option<String>,
    /// Refresh token obtained from the authorization flow.
    pub refresh_token: Option<String>,
    /// Per-request timeout for API and token calls.
    pub request_timeout_secs: u64,
    /// Page size for paginated list calls.
    pub page_size: u32,
}

impl Default for BlingConfig {
    fn default() -> Self {
        Self {
            api_base_url: BLING_API_BASE_URL.to_string(),
            token_url: BLING_TOKEN_URL.to_string(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl std::fmt::Debug for BlingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlingConfig")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Webhook endpoint settings.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WebhookConfig {
    /// HMAC signing secret. Absent means every delivery is answered 500.
    pub secret: Option<String>,
    /// Header carrying `sha256=<hex>`.
    pub signature_header: String,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self { secret: None, signature_header: WEBHOOK_SIGNATURE_HEADER.to_string() }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("signature_header", &self.signature_header)
            .finish()
    }
}

/// Sync orchestrator policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,
    /// First backoff delay; doubled per retry.
    pub base_retry_delay_secs: u64,
    /// Queue-wide pause after a 429 without `Retry-After`.
    pub rate_limit_cooldown_secs: u64,
    /// Six-field cron for the scheduled full sync.
    pub scheduled_cron: String,
    /// Six-field cron for the due-retry sweep.
    pub reconcile_cron: String,
    /// Days of sales orders fetched by a sales sync.
    pub sales_lookback_days: i64,
    /// Disable the cron-triggered full sync (manual and webhook paths stay on).
    pub scheduled_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay_secs: BASE_RETRY_DELAY_SECS,
            rate_limit_cooldown_secs: RATE_LIMIT_COOLDOWN_SECS,
            scheduled_cron: SCHEDULED_SYNC_CRON.to_string(),
            reconcile_cron: RECONCILE_CRON.to_string(),
            sales_lookback_days: SALES_LOOKBACK_DAYS,
            scheduled_enabled: true,
        }
    }
}

/// Token lifecycle thresholds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TokenConfig {
    /// Access tokens closer than this to expiry are refreshed before use.
    pub refresh_margin_secs: i64,
    /// Periodic renewal skips while more than this remains.
    pub renewal_window_hours: i64,
    /// Transient failures alert the operator only below this remaining lifetime.
    pub urgent_threshold_hours: i64,
    /// Minimum spacing between transient-failure alerts.
    pub notification_cooldown_hours: i64,
    /// Six-field cron for the renewal check.
    pub renewal_cron: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: TOKEN_REFRESH_MARGIN_SECS,
            renewal_window_hours: TOKEN_RENEWAL_WINDOW_HOURS,
            urgent_threshold_hours: TOKEN_URGENT_THRESHOLD_HOURS,
            notification_cooldown_hours: NOTIFICATION_COOLDOWN_HOURS,
            renewal_cron: TOKEN_RENEWAL_CRON.to_string(),
        }
    }
}

/// Operator notification delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NotificationConfig {
    /// Email relay endpoint. Without it notifications are only logged.
    pub relay_url: Option<String>,
    /// Recipient passed to the relay; the relay default applies when absent.
    pub recipient: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_address: String,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "0.0.0.0:8080".to_string(), log_format: LogFormat::Pretty }
    }
}

/// Log output format of the server binary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

const fn default_pool_size() -> u32 {
    8
}
