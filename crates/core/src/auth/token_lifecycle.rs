//! Token lifecycle manager
//!
//! Keeps the ERP access token usable. [`TokenLifecycleManager::ensure_valid_token`]
//! refreshes on demand just before expiry; [`TokenLifecycleManager::check_and_renew`]
//! runs periodically and renews well ahead of expiry so that a failing
//! refresh is noticed while there is still time to act.
//!
//! A refresh token rejected by the ERP deactivates the integration and
//! alerts the operator once. Transient failures only alert when expiry is
//! close and the last alert is older than the cooldown.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use stocksync_common::clock::Clock;
use stocksync_domain::{
    Credential, CredentialUpdate, TokenConfig, TokenError, TokenRefreshError,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::ports::CredentialStore;
use crate::erp_ports::{AccessTokenProvider, TokenRefresher};
use crate::notification_ports::{NotificationSeverity, Notifier, OperatorNotification};

/// Renewal thresholds.
#[derive(Debug, Clone)]
pub struct TokenLifecycleConfig {
    /// Refresh on demand when the token expires within this margin
    pub refresh_margin: Duration,
    /// Periodic renewal is skipped while more than this remains
    pub renewal_window: Duration,
    /// Transient failures alert only at or below this remaining lifetime
    pub urgent_threshold: Duration,
    /// Minimum spacing between transient-failure alerts
    pub notification_cooldown: Duration,
}

impl Default for TokenLifecycleConfig {
    fn default() -> Self {
        Self::from(&TokenConfig::default())
    }
}

impl From<&TokenConfig> for TokenLifecycleConfig {
    fn from(config: &TokenConfig) -> Self {
        Self {
            refresh_margin: Duration::try_seconds(config.refresh_margin_secs)
                .unwrap_or(Duration::zero()),
            renewal_window: Duration::try_hours(config.renewal_window_hours)
                .unwrap_or(Duration::zero()),
            urgent_threshold: Duration::try_hours(config.urgent_threshold_hours)
                .unwrap_or(Duration::zero()),
            notification_cooldown: Duration::try_hours(config.notification_cooldown_hours)
                .unwrap_or(Duration::zero()),
        }
    }
}

/// What a periodic renewal check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// No credential stored yet
    NotConfigured,
    /// Integration disabled; nothing attempted
    Inactive,
    /// Enough lifetime left; nothing attempted
    NotDue,
    /// Token refreshed ahead of expiry
    Renewed,
    /// Refresh token rejected; integration disabled and operator alerted
    Deactivated,
    /// Refresh failed transiently and the operator was alerted
    TransientNotified,
    /// Refresh failed transiently; alert withheld
    TransientSuppressed,
}

/// Keeps the stored OAuth credential valid.
///
/// Refreshes on demand and on schedule, deactivates the integration when the
/// refresh token is rejected, and alerts the operator.
pub struct TokenLifecycleManager {
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: TokenLifecycleConfig,
    /// Serializes refreshes so concurrent callers share one grant
    refresh_guard: Mutex<()>,
}

impl TokenLifecycleManager {
    /// Manager over `store` using `refresher` for grants.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn TokenRefresher>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: TokenLifecycleConfig,
    ) -> Self {
        Self { store, refresher, notifier, clock, config, refresh_guard: Mutex::new(()) }
    }

    /// Seed the store from configuration when no credential exists yet.
    ///
    /// An existing credential is returned untouched so that rotated tokens
    /// and the active flag survive restarts.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn bootstrap(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: Option<&str>,
    ) -> stocksync_domain::Result<Credential> {
        if let Some(existing) = self.store.get().await? {
            debug!("Credential already stored, skipping bootstrap");
            return Ok(existing);
        }

        let seeded = self
            .store
            .upsert(&CredentialUpdate {
                client_id: Some(client_id.to_string()),
                client_secret: Some(client_secret.to_string()),
                refresh_token: refresh_token.map(str::to_string),
                is_active: Some(true),
                ..CredentialUpdate::default()
            })
            .await?;
        info!("ERP credential seeded from configuration");
        Ok(seeded)
    }

    /// Whether syncs may call the ERP at all.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn is_active(&self) -> stocksync_domain::Result<bool> {
        Ok(self.store.get().await?.is_some_and(|credential| credential.is_active))
    }

    /// Return an access token valid for at least the refresh margin,
    /// refreshing first when needed.
    ///
    /// # Errors
    /// `NotConfigured`/`Inactive` when no usable credential exists,
    /// `Refresh` when the refresh failed, `Store` on persistence failures.
    #[instrument(skip(self))]
    pub async fn ensure_valid_token(&self) -> Result<String, TokenError> {
        let credential = self.load_active().await?;
        if let Some(token) = self.fresh_token(&credential) {
            return Ok(token);
        }

        let _guard = self.refresh_guard.lock().await;
        // Another caller may have refreshed while we waited.
        let credential = self.load_active().await?;
        if let Some(token) = self.fresh_token(&credential) {
            debug!("Token refreshed by concurrent caller");
            return Ok(token);
        }

        match self.refresh(&credential).await {
            Ok(refreshed) => refreshed
                .access_token
                .filter(|token| !token.is_empty())
                .ok_or_else(|| TokenError::Store("refreshed credential has no access token".into())),
            Err(TokenError::Refresh(TokenRefreshError::Permanent(reason))) => {
                self.handle_permanent(&reason).await;
                Err(TokenError::Refresh(TokenRefreshError::Permanent(reason)))
            }
            Err(other) => {
                warn!(error = %other, "On-demand token refresh failed");
                Err(other)
            }
        }
    }

    /// Periodic renewal ahead of expiry.
    ///
    /// # Errors
    /// Only store read failures are returned; refresh failures are
    /// classified into the outcome.
    #[instrument(skip(self))]
    pub async fn check_and_renew(&self) -> Result<RenewalOutcome, TokenError> {
        let _guard = self.refresh_guard.lock().await;

        let Some(credential) = self.store.get().await.map_err(store_error)? else {
            debug!("No ERP credential configured");
            return Ok(RenewalOutcome::NotConfigured);
        };
        if !credential.is_active {
            debug!("ERP integration inactive, skipping renewal");
            return Ok(RenewalOutcome::Inactive);
        }

        let now = self.clock.now();
        if credential.time_remaining(now).is_some_and(|left| left >= self.config.renewal_window) {
            debug!(hours_remaining = ?credential.hours_remaining(now), "Token renewal not due");
            return Ok(RenewalOutcome::NotDue);
        }

        match self.refresh(&credential).await {
            Ok(refreshed) => {
                info!(expires_at = ?refreshed.token_expires_at, "ERP token renewed");
                Ok(RenewalOutcome::Renewed)
            }
            Err(TokenError::Refresh(TokenRefreshError::Permanent(reason))) => {
                self.handle_permanent(&reason).await;
                Ok(RenewalOutcome::Deactivated)
            }
            Err(other) => Ok(self.handle_transient(&credential, &other.to_string()).await),
        }
    }

    async fn load_active(&self) -> Result<Credential, TokenError> {
        let credential = self.store.get().await.map_err(store_error)?.ok_or(TokenError::NotConfigured)?;
        if credential.is_active {
            Ok(credential)
        } else {
            Err(TokenError::Inactive)
        }
    }

    fn fresh_token(&self, credential: &Credential) -> Option<String> {
        if credential.needs_refresh(self.clock.now(), self.config.refresh_margin) {
            None
        } else {
            credential.access_token.clone()
        }
    }

    /// Exchange the stored refresh token and persist the grant.
    async fn refresh(&self, credential: &Credential) -> Result<Credential, TokenError> {
        let Some(refresh_token) =
            credential.refresh_token.as_deref().filter(|token| !token.is_empty())
        else {
            return Err(TokenRefreshError::Permanent("no refresh token stored".into()).into());
        };

        let grant = self
            .refresher
            .refresh_token(&credential.client_id, &credential.client_secret, refresh_token)
            .await?;

        let now = self.clock.now();
        self.store.upsert(&CredentialUpdate::from_grant(&grant, now)).await.map_err(store_error)
    }

    async fn handle_permanent(&self, reason: &str) {
        let now = self.clock.now();
        error!(reason, "Refresh token rejected, deactivating ERP integration");

        let update = CredentialUpdate {
            is_active: Some(false),
            last_notification_sent_at: Some(now),
            ..CredentialUpdate::default()
        };
        if let Err(err) = self.store.upsert(&update).await {
            error!(error = %err, "Failed to persist credential deactivation");
        }

        self.notifier
            .notify(&OperatorNotification {
                severity: NotificationSeverity::Critical,
                subject: "Bling integration disabled: re-authorization required".into(),
                body: format!(
                    "The ERP rejected the stored refresh token ({reason}). All syncs are \
                     stopped until the integration is authorized again."
                ),
            })
            .await;
    }

    async fn handle_transient(&self, credential: &Credential, reason: &str) -> RenewalOutcome {
        let now = self.clock.now();
        let remaining = credential.time_remaining(now);
        let urgent = remaining.map_or(true, |left| left <= self.config.urgent_threshold);
        let cooled_down = cooldown_elapsed(
            credential.last_notification_sent_at,
            now,
            self.config.notification_cooldown,
        );

        if !(urgent && cooled_down) {
            warn!(reason, urgent, cooled_down, "Token renewal failed, alert withheld");
            return RenewalOutcome::TransientSuppressed;
        }

        warn!(reason, "Token renewal failed close to expiry, alerting operator");
        if let Err(err) = self.store.upsert(&CredentialUpdate::notified_at(now)).await {
            error!(error = %err, "Failed to record notification time");
        }

        let hours = credential
            .hours_remaining(now)
            .map_or_else(|| "unknown".to_string(), |hours| format!("{hours:.1}"));
        self.notifier
            .notify(&OperatorNotification {
                severity: NotificationSeverity::Warning,
                subject: "Bling token renewal failing".into(),
                body: format!(
                    "Renewing the ERP access token failed ({reason}). Hours until expiry: {hours}."
                ),
            })
            .await;
        RenewalOutcome::TransientNotified
    }
}

#[async_trait]
impl AccessTokenProvider for TokenLifecycleManager {
    async fn access_token(&self) -> Result<String, TokenError> {
        self.ensure_valid_token().await
    }
}

fn cooldown_elapsed(last: Option<DateTime<Utc>>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    last.map_or(true, |sent_at| now - sent_at >= cooldown)
}

fn store_error(err: stocksync_domain::StockSyncError) -> TokenError {
    TokenError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = TokenLifecycleConfig::default();
        assert_eq!(config.refresh_margin, Duration::minutes(5));
        assert_eq!(config.renewal_window, Duration::hours(48));
        assert_eq!(config.urgent_threshold, Duration::hours(6));
        assert_eq!(config.notification_cooldown, Duration::hours(24));
    }

    #[test]
    fn cooldown_boundaries() {
        let now = Utc::now();
        let cooldown = Duration::hours(24);
        assert!(cooldown_elapsed(None, now, cooldown));
        assert!(!cooldown_elapsed(Some(now - Duration::hours(23)), now, cooldown));
        assert!(cooldown_elapsed(Some(now - Duration::hours(24)), now, cooldown));
    }
}
