//! Scriptable collaborators: executor, ERP API, token refresher, notifier

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde_json::{json, Value};
use stocksync_core::erp_ports::{ErpApi, TokenRefresher};
use stocksync_core::notification_ports::{Notifier, OperatorNotification};
use stocksync_core::sync::SyncExecutor;
use stocksync_domain::{
    ErpApiError, IntegrationError, SyncCounts, SyncKind, TokenGrant, TokenRefreshError,
};
use tokio::sync::Semaphore;

type ExecResult = Result<SyncCounts, IntegrationError>;

/// Executor returning scripted outcomes in call order.
///
/// When gated, each execution blocks until [`ScriptedExecutor::release`]
/// hands it a permit, so tests can observe the orchestrator mid-run.
pub struct ScriptedExecutor {
    script: Mutex<VecDeque<ExecResult>>,
    gate: Option<Semaphore>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    executed: Mutex<Vec<SyncKind>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn gated() -> Self {
        Self::build(Some(Semaphore::new(0)))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            gate,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Queue the outcome of the next unscripted execution.
    pub fn push(&self, outcome: ExecResult) -> &Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Let `count` blocked executions finish.
    pub fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Kinds in the order executions started.
    pub fn executed(&self) -> Vec<SyncKind> {
        self.executed.lock().unwrap().clone()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    /// Wait until `count` executions have started.
    pub async fn wait_started(&self, count: usize) {
        for _ in 0..500 {
            if self.executed.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
        panic!("expected {count} executions to start, saw {:?}", self.executed());
    }
}

#[async_trait]
impl SyncExecutor for ScriptedExecutor {
    async fn execute(&self, kind: SyncKind) -> ExecResult {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.executed.lock().unwrap().push(kind);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let outcome =
            self.script.lock().unwrap().pop_front().unwrap_or(Ok(SyncCounts::new(1, 0)));
        self.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

/// ERP API answering from per-path queues; empty queues yield `{"data": []}`.
#[derive(Default)]
pub struct FakeErpApi {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, ErpApiError>>>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeErpApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, path: &str, response: Result<Value, ErpApiError>) -> &Self {
        self.responses.lock().unwrap().entry(path.to_string()).or_default().push_back(response);
        self
    }

    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<Vec<(String, String)>> {
        self.requests()
            .into_iter()
            .filter(|(requested, _)| requested == path)
            .map(|(_, query)| query)
            .collect()
    }
}

#[async_trait]
impl ErpApi for FakeErpApi {
    async fn get_json(&self, path: &str, query: &[(String, String)]) -> Result<Value, ErpApiError> {
        self.requests.lock().unwrap().push((path.to_string(), query.to_vec()));
        self.responses
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(json!({ "data": [] })))
    }

    async fn post_json(&self, path: &str, _body: &Value) -> Result<Value, ErpApiError> {
        self.get_json(path, &[]).await
    }
}

/// Token refresher with scripted outcomes and an optional delay.
pub struct FakeRefresher {
    script: Mutex<VecDeque<Result<TokenGrant, TokenRefreshError>>>,
    calls: AtomicUsize,
    delay: StdDuration,
}

impl FakeRefresher {
    pub fn new() -> Self {
        Self::with_delay(StdDuration::ZERO)
    }

    pub fn with_delay(delay: StdDuration) -> Self {
        Self { script: Mutex::new(VecDeque::new()), calls: AtomicUsize::new(0), delay }
    }

    pub fn push(&self, outcome: Result<TokenGrant, TokenRefreshError>) -> &Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Six-hour grant with a rotated refresh token.
pub fn grant(access_token: &str) -> TokenGrant {
    TokenGrant {
        access_token: access_token.to_string(),
        refresh_token: Some(format!("{access_token}-refresh")),
        expires_in: 21_600,
    }
}

#[async_trait]
impl TokenRefresher for FakeRefresher {
    async fn refresh_token(
        &self,
        _client_id: &str,
        _client_secret: &str,
        _refresh_token: &str,
    ) -> Result<TokenGrant, TokenRefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| Ok(grant("access-fresh")))
    }
}

/// Notifier that keeps every notification.
#[derive(Default, Clone)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<OperatorNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OperatorNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &OperatorNotification) {
        self.sent.lock().unwrap().push(notification.clone());
    }
}
