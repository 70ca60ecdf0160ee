//! Application constants
//!
//! Centralized location for the domain-level defaults of the integration
//! subsystem. Everything here can be overridden through [`crate::Config`].

// Sync orchestration
/// Retries after the first failed attempt of a run.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// First retry delay; doubles per retry (5, 10, 20 minutes).
pub const BASE_RETRY_DELAY_SECS: u64 = 5 * 60;
/// Queue-wide pause after a rate-limit answer without `Retry-After`.
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 10 * 60;
/// Scheduled full sync, every four hours.
pub const SCHEDULED_SYNC_CRON: &str = "0 0 */4 * * *";
/// Due-retry sweep, every minute.
pub const RECONCILE_CRON: &str = "0 * * * * *";
/// Window of sales orders fetched by a sales sync.
pub const SALES_LOOKBACK_DAYS: i64 = 30;

// Token lifecycle
/// Refresh an access token this close to expiry before using it.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;
/// Periodic renewal skips while at least this much lifetime remains.
pub const TOKEN_RENEWAL_WINDOW_HOURS: i64 = 48;
/// Transient renewal failures alert the operator below this lifetime.
pub const TOKEN_URGENT_THRESHOLD_HOURS: i64 = 6;
/// Minimum spacing between transient-failure alerts.
pub const NOTIFICATION_COOLDOWN_HOURS: i64 = 24;
/// Renewal check, every six hours.
pub const TOKEN_RENEWAL_CRON: &str = "0 0 */6 * * *";

// Webhooks
/// Header carrying the webhook body signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "X-Bling-Signature-256";
/// Prefix of the signature header value.
pub const WEBHOOK_SIGNATURE_PREFIX: &str = "sha256=";

// Remote API
/// Production REST API base URL.
pub const BLING_API_BASE_URL: &str = "https://api.bling.com.br/Api/v3";
/// Production OAuth token endpoint.
pub const BLING_TOKEN_URL: &str = "https://api.bling.com.br/Api/v3/oauth/token";
/// Page size for paginated list calls.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Product ids per stock balance request.
pub const STOCK_BALANCE_BATCH_SIZE: usize = 50;
/// Per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

// History listing
/// History entries returned when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: u32 = 50;
/// Upper bound on a history listing.
pub const MAX_HISTORY_LIMIT: u32 = 500;
/// Stored error messages are truncated to this many characters.
pub const MAX_ERROR_MESSAGE_LEN: usize = 1000;
