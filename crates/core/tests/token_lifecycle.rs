//! Token renewal, failure classification and notification throttling.

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use stocksync_common::clock::MockClock;
use stocksync_core::auth::{RenewalOutcome, TokenLifecycleConfig, TokenLifecycleManager};
use stocksync_core::notification_ports::NotificationSeverity;
use stocksync_domain::{Credential, TokenError, TokenRefreshError};
use support::fakes::{FakeRefresher, RecordingNotifier};
use support::repositories::InMemoryCredentials;
use support::{credential_expiring_in, t0};

struct Harness {
    manager: Arc<TokenLifecycleManager>,
    store: Arc<InMemoryCredentials>,
    refresher: Arc<FakeRefresher>,
    notifier: RecordingNotifier,
    clock: MockClock,
}

fn harness_with(store: InMemoryCredentials, refresher: FakeRefresher) -> Harness {
    let store = Arc::new(store);
    let refresher = Arc::new(refresher);
    let notifier = RecordingNotifier::new();
    let clock = MockClock::at(t0());
    let manager = Arc::new(TokenLifecycleManager::new(
        store.clone(),
        refresher.clone(),
        Arc::new(notifier.clone()),
        Arc::new(clock.clone()),
        TokenLifecycleConfig::default(),
    ));
    Harness { manager, store, refresher, notifier, clock }
}

fn harness(credential: Credential) -> Harness {
    harness_with(InMemoryCredentials::with(credential), FakeRefresher::new())
}

fn transient() -> Result<stocksync_domain::TokenGrant, TokenRefreshError> {
    Err(TokenRefreshError::Transient("connection reset".into()))
}

#[tokio::test]
async fn cached_token_is_returned_outside_the_margin() {
    let h = harness(credential_expiring_in(t0(), Duration::minutes(6)));

    assert_eq!(h.manager.ensure_valid_token().await.unwrap(), "access-1");
    assert_eq!(h.refresher.calls(), 0);
}

#[tokio::test]
async fn token_inside_the_margin_is_refreshed_first() {
    let h = harness(credential_expiring_in(t0(), Duration::minutes(4)));

    assert_eq!(h.manager.ensure_valid_token().await.unwrap(), "access-fresh");
    assert_eq!(h.refresher.calls(), 1);

    let stored = h.store.current().unwrap();
    assert_eq!(stored.token_expires_at, Some(t0() + Duration::hours(6)));
    assert_eq!(stored.refresh_token.as_deref(), Some("access-fresh-refresh"));
}

#[tokio::test]
async fn concurrent_callers_share_one_refresh() {
    let h = harness_with(
        InMemoryCredentials::with(credential_expiring_in(t0(), Duration::minutes(1))),
        FakeRefresher::with_delay(StdDuration::from_millis(50)),
    );

    let (a, b, c) = tokio::join!(
        h.manager.ensure_valid_token(),
        h.manager.ensure_valid_token(),
        h.manager.ensure_valid_token(),
    );

    assert_eq!(h.refresher.calls(), 1);
    for token in [a, b, c] {
        assert_eq!(token.unwrap(), "access-fresh");
    }
}

#[tokio::test]
async fn renewal_is_skipped_with_48_hours_left() {
    let h = harness(credential_expiring_in(t0(), Duration::hours(48)));

    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::NotDue);
    assert_eq!(h.refresher.calls(), 0);

    h.clock.advance(Duration::minutes(1));
    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::Renewed);
    assert_eq!(h.refresher.calls(), 1);
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn permanent_failure_deactivates_and_notifies_once() {
    let h = harness(credential_expiring_in(t0(), Duration::hours(10)));
    h.refresher.push(Err(TokenRefreshError::Permanent("invalid_grant".into())));

    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::Deactivated);

    let stored = h.store.current().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.last_notification_sent_at, Some(t0()));

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, NotificationSeverity::Critical);
    assert!(sent[0].body.contains("invalid_grant"));

    // Later checks and on-demand calls stop at the inactive flag.
    h.clock.advance(Duration::minutes(5));
    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::Inactive);
    assert_eq!(h.manager.ensure_valid_token().await, Err(TokenError::Inactive));
    assert!(!h.manager.is_active().await.unwrap());
    assert_eq!(h.notifier.sent().len(), 1);
    assert_eq!(h.refresher.calls(), 1);
}

#[tokio::test]
async fn on_demand_permanent_failure_takes_the_same_path() {
    let h = harness(credential_expiring_in(t0(), Duration::minutes(2)));
    h.refresher.push(Err(TokenRefreshError::Permanent("invalid_token".into())));

    let err = h.manager.ensure_valid_token().await.unwrap_err();
    assert!(matches!(err, TokenError::Refresh(TokenRefreshError::Permanent(_))));
    assert!(!h.store.current().unwrap().is_active);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn transient_failure_respects_the_notification_cooldown() {
    let mut credential = credential_expiring_in(t0(), Duration::hours(5));
    credential.last_notification_sent_at = Some(t0() - Duration::hours(23));
    let h = harness(credential);

    h.refresher.push(transient());
    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::TransientSuppressed);
    assert!(h.notifier.sent().is_empty());

    h.clock.advance(Duration::hours(1));
    h.refresher.push(transient());
    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::TransientNotified);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].severity, NotificationSeverity::Warning);
    assert_eq!(
        h.store.current().unwrap().last_notification_sent_at,
        Some(t0() + Duration::hours(1))
    );
    assert!(h.store.current().unwrap().is_active);

    h.clock.advance(Duration::hours(1));
    h.refresher.push(transient());
    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::TransientSuppressed);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn transient_failure_far_from_expiry_is_not_reported() {
    let h = harness(credential_expiring_in(t0(), Duration::hours(20)));
    h.refresher.push(transient());

    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::TransientSuppressed);
    assert!(h.notifier.sent().is_empty());
    assert!(h.store.current().unwrap().is_active);
}

#[tokio::test]
async fn missing_credential_is_not_configured() {
    let h = harness_with(InMemoryCredentials::default(), FakeRefresher::new());

    assert_eq!(h.manager.check_and_renew().await.unwrap(), RenewalOutcome::NotConfigured);
    assert_eq!(h.manager.ensure_valid_token().await, Err(TokenError::NotConfigured));
}

#[tokio::test]
async fn bootstrap_seeds_only_an_empty_store() {
    let h = harness_with(InMemoryCredentials::default(), FakeRefresher::new());

    let seeded = h.manager.bootstrap("id", "secret", Some("seed-refresh")).await.unwrap();
    assert!(seeded.is_active);
    assert_eq!(seeded.refresh_token.as_deref(), Some("seed-refresh"));
    assert!(seeded.access_token.is_none());

    // A seeded credential without an access token refreshes on first use.
    assert_eq!(h.manager.ensure_valid_token().await.unwrap(), "access-fresh");

    let again = h.manager.bootstrap("other-id", "other-secret", Some("other")).await.unwrap();
    assert_eq!(again.client_id, "id");
    assert_eq!(again.refresh_token.as_deref(), Some("access-fresh-refresh"));
}
