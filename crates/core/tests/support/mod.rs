//! Shared test helpers for `stocksync-core` integration tests.
//!
//! In-memory port implementations and scriptable collaborators so the
//! orchestrator, webhook pipeline and token manager can be exercised
//! without SQLite or HTTP.
#![allow(dead_code)]

pub mod fakes;
pub mod repositories;

use chrono::{DateTime, Duration, TimeZone, Utc};
use stocksync_domain::Credential;

/// Fixed start instant for deterministic clocks.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
}

/// Active credential whose access token expires `expires_in` after `now`.
pub fn credential_expiring_in(now: DateTime<Utc>, expires_in: Duration) -> Credential {
    Credential {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        access_token: Some("access-1".into()),
        refresh_token: Some("refresh-1".into()),
        token_expires_at: Some(now + expires_in),
        is_active: true,
        last_notification_sent_at: None,
        updated_at: now,
    }
}
