//! Bling error classification
//!
//! Turns HTTP outcomes into the typed errors the core reasons about:
//! [`ErpApiError`] for API calls and [`TokenRefreshError`] for the OAuth
//! refresh grant.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde_json::Value;
use stocksync_domain::{ErpApiError, TokenRefreshError};

use crate::http::HttpClientError;

/// OAuth error codes meaning the stored refresh token (or client) is dead.
const PERMANENT_OAUTH_ERRORS: [&str; 3] = ["invalid_grant", "invalid_token", "invalid_client"];

const MAX_BODY_EXCERPT: usize = 300;

impl From<HttpClientError> for ErpApiError {
    fn from(err: HttpClientError) -> Self {
        match err {
            HttpClientError::Timeout => ErpApiError::Timeout(err.to_string()),
            HttpClientError::Build(message) => ErpApiError::Config(message),
            other => ErpApiError::Network(other.to_string()),
        }
    }
}

/// Map a non-success API response.
pub fn classify_api_error(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    now: DateTime<Utc>,
) -> ErpApiError {
    let message = error_message(body).unwrap_or_else(|| {
        status.canonical_reason().unwrap_or("unexpected status").to_string()
    });

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ErpApiError::RateLimited { message, retry_after_secs: retry_after(headers, now) };
    }

    ErpApiError::Status { status: status.as_u16(), message }
}

/// Map a failed refresh-token grant.
///
/// Only 400/401 answers naming a dead grant or client are permanent;
/// everything else (5xx, 429, other 4xx) may succeed on a later attempt.
pub fn classify_refresh_failure(status: StatusCode, body: &str) -> TokenRefreshError {
    let detail = error_message(body).unwrap_or_else(|| excerpt(body));
    let message = format!("HTTP {}: {detail}", status.as_u16());

    let rejected = matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED)
        && PERMANENT_OAUTH_ERRORS.iter().any(|code| body.contains(code));

    if rejected {
        TokenRefreshError::Permanent(message)
    } else {
        TokenRefreshError::Transient(message)
    }
}

/// `Retry-After` as delay seconds or an HTTP date.
pub fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<u64> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds);
    }
    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    u64::try_from((at - now).num_seconds()).ok()
}

/// Pull a human message out of the error bodies Bling and its OAuth
/// server return (`{"error": {"message": ...}}` or
/// `{"error": "...", "error_description": "..."}`).
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    if let Some(code) = error.as_str() {
        return Some(match value.get("error_description").and_then(Value::as_str) {
            Some(description) => format!("{code}: {description}"),
            None => code.to_string(),
        });
    }

    ["description", "message", "type"]
        .iter()
        .find_map(|key| error.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(MAX_BODY_EXCERPT).collect()
}
