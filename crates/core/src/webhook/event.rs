//! Event tag and timestamp parsing

use chrono::{DateTime, NaiveDateTime, Utc};
use stocksync_domain::{WebhookAction, WebhookResource};

/// Split a combined `resource.action` tag on its last dot.
///
/// Tags without a dot yield an empty action.
pub fn split_event_tag(tag: &str) -> (&str, &str) {
    tag.rsplit_once('.').unwrap_or((tag, ""))
}

/// Typed form of a tag, when both parts are known.
pub fn parse_event_tag(tag: &str) -> Option<(WebhookResource, WebhookAction)> {
    let (resource, action) = split_event_tag(tag);
    Some((WebhookResource::parse(resource)?, WebhookAction::parse(action)?))
}

/// Time the change happened at the ERP.
///
/// Accepts RFC 3339 and the vendor's `YYYY-MM-DD HH:MM:SS` form (read as
/// UTC). Falls back to `received_at` when missing or unparseable, so an
/// event is never ordered before its own delivery.
pub fn event_time(date: Option<&str>, received_at: DateTime<Utc>) -> DateTime<Utc> {
    let Some(date) = date.map(str::trim).filter(|value| !value.is_empty()) else {
        return received_at;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return parsed.with_timezone(&Utc);
    }
    NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or(received_at)
}
