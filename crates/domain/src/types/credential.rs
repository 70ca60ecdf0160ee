//! OAuth credential of the ERP integration

use std::fmt;

use chrono::{DateTime, Duration, Utc};

/// Stored OAuth client and token state. Single row per installation.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Current access token
    pub access_token: Option<String>,
    /// Refresh token for the next grant
    pub refresh_token: Option<String>,
    /// Access token expiry
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Forced false when the refresh token is permanently rejected.
    pub is_active: bool,
    /// Last transient-failure alert, for the cooldown
    pub last_notification_sent_at: Option<DateTime<Utc>>,
    /// Last write
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    /// Time left before the access token expires. `None` when no expiry is
    /// known, which callers treat as already expired.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.token_expires_at.map(|expires_at| expires_at - now)
    }

    /// Fractional hours remaining, as compared against renewal thresholds.
    #[allow(clippy::cast_precision_loss)]
    pub fn hours_remaining(&self, now: DateTime<Utc>) -> Option<f64> {
        self.time_remaining(now).map(|left| left.num_seconds() as f64 / 3600.0)
    }

    /// True when `now + margin` has reached the expiry, or no usable access
    /// token is stored.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match (&self.access_token, self.token_expires_at) {
            (Some(token), Some(expires_at)) if !token.is_empty() => now + margin >= expires_at,
            _ => true,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_expires_at", &self.token_expires_at)
            .field("is_active", &self.is_active)
            .field("last_notification_sent_at", &self.last_notification_sent_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Partial update applied through the credential store's upsert.
/// `None` fields are left untouched.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialUpdate {
    /// New client id
    pub client_id: Option<String>,
    /// New client secret
    pub client_secret: Option<String>,
    /// New access token
    pub access_token: Option<String>,
    /// Rotated refresh token
    pub refresh_token: Option<String>,
    /// New access token expiry
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Activation flag
    pub is_active: Option<bool>,
    /// Alert timestamp
    pub last_notification_sent_at: Option<DateTime<Utc>>,
}

impl CredentialUpdate {
    /// Store a freshly granted token pair.
    pub fn from_grant(grant: &TokenGrant, now: DateTime<Utc>) -> Self {
        Self {
            access_token: Some(grant.access_token.clone()),
            refresh_token: grant.refresh_token.clone(),
            token_expires_at: Some(now + Duration::seconds(grant.expires_in)),
            ..Self::default()
        }
    }

    /// Disable the integration.
    pub fn deactivate() -> Self {
        Self { is_active: Some(false), ..Self::default() }
    }

    /// Record an alert sent at `at`.
    pub fn notified_at(at: DateTime<Utc>) -> Self {
        Self { last_notification_sent_at: Some(at), ..Self::default() }
    }

    /// Apply onto an existing credential.
    pub fn apply_to(&self, credential: &mut Credential, now: DateTime<Utc>) {
        if let Some(value) = &self.client_id {
            credential.client_id.clone_from(value);
        }
        if let Some(value) = &self.client_secret {
            credential.client_secret.clone_from(value);
        }
        if self.access_token.is_some() {
            credential.access_token.clone_from(&self.access_token);
        }
        if self.refresh_token.is_some() {
            credential.refresh_token.clone_from(&self.refresh_token);
        }
        if self.token_expires_at.is_some() {
            credential.token_expires_at = self.token_expires_at;
        }
        if let Some(active) = self.is_active {
            credential.is_active = active;
        }
        if self.last_notification_sent_at.is_some() {
            credential.last_notification_sent_at = self.last_notification_sent_at;
        }
        credential.updated_at = now;
    }
}

impl fmt::Debug for CredentialUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialUpdate")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("token_expires_at", &self.token_expires_at)
            .field("is_active", &self.is_active)
            .field("last_notification_sent_at", &self.last_notification_sent_at)
            .finish()
    }
}

/// Result of a successful refresh. The ERP may omit a rotated refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// Bearer token for API calls
    pub access_token: String,
    /// Rotated refresh token, if the ERP sent one
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}
