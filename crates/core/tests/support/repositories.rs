//! In-memory repository fakes
//!
//! Mirror the contracts of the SQLite repositories closely enough for
//! orchestrator and pipeline tests: atomic single writes, conditional
//! processed marking, and last-write-wins catalog rows with tombstones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_core::auth::CredentialStore;
use stocksync_core::catalog_ports::CatalogStore;
use stocksync_core::sync::SyncRunRepository;
use stocksync_core::webhook::WebhookEventRepository;
use stocksync_domain::{
    Credential, CredentialUpdate, DepositStock, Product, ProductSupplier, Result, SalesOrder,
    StockBalance, StockSyncError, SyncCounts, SyncRun, SyncStatus, TriggeredBy, WebhookEvent,
};
use uuid::Uuid;

/// In-memory `SyncRunRepository`.
#[derive(Default)]
pub struct InMemorySyncRuns {
    runs: Mutex<Vec<SyncRun>>,
    stale_due: Mutex<Option<Vec<SyncRun>>>,
}

impl InMemorySyncRuns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a run as if persisted by an earlier process.
    pub fn seed(&self, run: SyncRun) {
        self.runs.lock().unwrap().push(run);
    }

    pub fn run(&self, id: Uuid) -> SyncRun {
        self.runs
            .lock()
            .unwrap()
            .iter()
            .find(|run| run.id == id)
            .cloned()
            .unwrap_or_else(|| panic!("run {id} not stored"))
    }

    /// Answer the next `find_due_retries` with `due` regardless of the stored
    /// state, as a sweep that read the due list earlier would see it.
    pub fn serve_due_once(&self, due: Vec<SyncRun>) {
        *self.stale_due.lock().unwrap() = Some(due);
    }

    pub fn all(&self) -> Vec<SyncRun> {
        self.runs.lock().unwrap().clone()
    }

    fn update(&self, id: Uuid, apply: impl FnOnce(&mut SyncRun)) -> Result<()> {
        let mut runs = self.runs.lock().unwrap();
        let run = runs
            .iter_mut()
            .find(|run| run.id == id)
            .ok_or_else(|| StockSyncError::NotFound(format!("sync run {id}")))?;
        apply(run);
        Ok(())
    }
}

#[async_trait]
impl SyncRunRepository for InMemorySyncRuns {
    async fn insert(&self, run: &SyncRun) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncRun>> {
        Ok(self.runs.lock().unwrap().iter().find(|run| run.id == id).cloned())
    }

    async fn mark_running(&self, id: Uuid, started_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |run| {
            run.status = SyncStatus::Running;
            run.started_at = Some(started_at);
            run.next_retry_at = None;
        })
    }

    async fn mark_queued(&self, id: Uuid) -> Result<bool> {
        let mut runs = self.runs.lock().unwrap();
        match runs.iter_mut().find(|run| run.id == id && run.status == SyncStatus::Retrying) {
            Some(run) => {
                run.status = SyncStatus::Queued;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn complete(&self, id: Uuid, counts: SyncCounts, completed_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |run| {
            run.status = SyncStatus::Completed;
            run.items_synced = counts.synced;
            run.items_errors = counts.errors;
            run.completed_at = Some(completed_at);
            run.error_message = None;
        })
    }

    async fn schedule_retry(
        &self,
        id: Uuid,
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
        triggered_by: TriggeredBy,
        error: &str,
    ) -> Result<()> {
        self.update(id, |run| {
            run.status = SyncStatus::Retrying;
            run.retry_count = retry_count;
            run.next_retry_at = Some(next_retry_at);
            run.triggered_by = triggered_by;
            run.error_message = Some(error.to_string());
        })
    }

    async fn fail(&self, id: Uuid, error: &str, completed_at: DateTime<Utc>) -> Result<()> {
        self.update(id, |run| {
            run.status = SyncStatus::Failed;
            run.error_message = Some(error.to_string());
            run.completed_at = Some(completed_at);
            run.next_retry_at = None;
        })
    }

    async fn find_due_retries(&self, now: DateTime<Utc>) -> Result<Vec<SyncRun>> {
        if let Some(due) = self.stale_due.lock().unwrap().take() {
            return Ok(due);
        }
        let mut due: Vec<SyncRun> = self
            .runs
            .lock()
            .unwrap()
            .iter()
            .filter(|run| {
                run.status == SyncStatus::Retrying && run.next_retry_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|run| run.next_retry_at);
        Ok(due)
    }

    async fn find_by_status(&self, status: SyncStatus) -> Result<Vec<SyncRun>> {
        let mut runs: Vec<SyncRun> =
            self.runs.lock().unwrap().iter().filter(|run| run.status == status).cloned().collect();
        runs.sort_by_key(|run| run.created_at);
        Ok(runs)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncRun>> {
        let mut runs = self.all();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit as usize);
        Ok(runs)
    }
}

/// In-memory `WebhookEventRepository`. Can be switched to fail every call.
#[derive(Default)]
pub struct InMemoryWebhookEvents {
    events: Mutex<HashMap<String, WebhookEvent>>,
    failing: AtomicBool,
}

impl InMemoryWebhookEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn event(&self, event_id: &str) -> Option<WebhookEvent> {
        self.events.lock().unwrap().get(event_id).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StockSyncError::Database("database is locked".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEvents {
    async fn exists(&self, event_id: &str) -> Result<bool> {
        self.check()?;
        Ok(self.events.lock().unwrap().contains_key(event_id))
    }

    async fn insert_if_absent(&self, event: &WebhookEvent) -> Result<bool> {
        self.check()?;
        let mut events = self.events.lock().unwrap();
        if events.contains_key(&event.event_id) {
            return Ok(false);
        }
        events.insert(event.event_id.clone(), event.clone());
        Ok(true)
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        error: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check()?;
        let mut events = self.events.lock().unwrap();
        match events.get_mut(event_id) {
            Some(event) if !event.processed => {
                event.processed = true;
                event.processed_at = Some(processed_at);
                event.error = error.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get(&self, event_id: &str) -> Result<Option<WebhookEvent>> {
        self.check()?;
        Ok(self.event(event_id))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<WebhookEvent>> {
        self.check()?;
        let mut events: Vec<WebhookEvent> = self.events.lock().unwrap().values().cloned().collect();
        events.sort_by(|a, b| b.received_at.cmp(&a.received_at));
        events.truncate(limit as usize);
        Ok(events)
    }
}

/// Row plus tombstone flag, stamped with its source time.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: Option<T>,
    pub at: DateTime<Utc>,
}

/// Last-write-wins check shared by every table.
fn lww_write<K: std::hash::Hash + Eq, T>(
    table: &mut HashMap<K, Versioned<T>>,
    key: K,
    value: Option<T>,
    at: DateTime<Utc>,
) -> bool {
    if table.get(&key).is_some_and(|current| current.at > at) {
        return false;
    }
    table.insert(key, Versioned { value, at });
    true
}

/// In-memory `CatalogStore` with last-write-wins semantics.
#[derive(Default)]
pub struct InMemoryCatalog {
    pub products: Mutex<HashMap<i64, Versioned<Product>>>,
    pub balances: Mutex<HashMap<i64, Versioned<StockBalance>>>,
    pub deposits: Mutex<HashMap<(i64, i64), Versioned<DepositStock>>>,
    pub orders: Mutex<HashMap<i64, Versioned<SalesOrder>>>,
    pub suppliers: Mutex<HashMap<i64, Versioned<ProductSupplier>>>,
    failing: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn product(&self, id: i64) -> Option<Product> {
        self.products.lock().unwrap().get(&id).and_then(|row| row.value.clone())
    }

    pub fn balance(&self, product_id: i64) -> Option<StockBalance> {
        self.balances.lock().unwrap().get(&product_id).and_then(|row| row.value.clone())
    }

    pub fn deposit(&self, product_id: i64, deposit_id: i64) -> Option<DepositStock> {
        self.deposits
            .lock()
            .unwrap()
            .get(&(product_id, deposit_id))
            .and_then(|row| row.value.clone())
    }

    pub fn order(&self, id: i64) -> Option<SalesOrder> {
        self.orders.lock().unwrap().get(&id).and_then(|row| row.value.clone())
    }

    pub fn supplier_link(&self, id: i64) -> Option<ProductSupplier> {
        self.suppliers.lock().unwrap().get(&id).and_then(|row| row.value.clone())
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StockSyncError::Database("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn upsert_product(&self, product: &Product) -> Result<bool> {
        self.check()?;
        let mut table = self.products.lock().unwrap();
        Ok(lww_write(&mut table, product.bling_id, Some(product.clone()), product.source_updated_at))
    }

    async fn delete_product(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        Ok(lww_write(&mut self.products.lock().unwrap(), bling_id, None, deleted_at))
    }

    async fn upsert_stock_balance(&self, balance: &StockBalance) -> Result<bool> {
        self.check()?;
        let mut table = self.balances.lock().unwrap();
        Ok(lww_write(&mut table, balance.product_id, Some(balance.clone()), balance.source_updated_at))
    }

    async fn upsert_deposit_stock(&self, stock: &DepositStock) -> Result<bool> {
        self.check()?;
        let mut table = self.deposits.lock().unwrap();
        let key = (stock.product_id, stock.deposit_id);
        Ok(lww_write(&mut table, key, Some(stock.clone()), stock.source_updated_at))
    }

    async fn upsert_sales_order(&self, order: &SalesOrder) -> Result<bool> {
        self.check()?;
        let mut table = self.orders.lock().unwrap();
        Ok(lww_write(&mut table, order.bling_id, Some(order.clone()), order.source_updated_at))
    }

    async fn delete_sales_order(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        Ok(lww_write(&mut self.orders.lock().unwrap(), bling_id, None, deleted_at))
    }

    async fn upsert_product_supplier(&self, link: &ProductSupplier) -> Result<bool> {
        self.check()?;
        let mut table = self.suppliers.lock().unwrap();
        Ok(lww_write(&mut table, link.bling_id, Some(link.clone()), link.source_updated_at))
    }

    async fn delete_product_supplier(
        &self,
        bling_id: i64,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.check()?;
        Ok(lww_write(&mut self.suppliers.lock().unwrap(), bling_id, None, deleted_at))
    }

    async fn list_product_ids(&self) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, row)| row.value.is_some())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// In-memory single-row `CredentialStore`.
#[derive(Default)]
pub struct InMemoryCredentials {
    credential: Mutex<Option<Credential>>,
}

impl InMemoryCredentials {
    pub fn with(credential: Credential) -> Self {
        Self { credential: Mutex::new(Some(credential)) }
    }

    pub fn current(&self) -> Option<Credential> {
        self.credential.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentials {
    async fn get(&self) -> Result<Option<Credential>> {
        Ok(self.current())
    }

    async fn upsert(&self, update: &CredentialUpdate) -> Result<Credential> {
        let now = Utc::now();
        let mut slot = self.credential.lock().unwrap();
        let credential = match slot.as_mut() {
            Some(existing) => {
                update.apply_to(existing, now);
                existing.clone()
            }
            None => {
                let (Some(client_id), Some(client_secret)) =
                    (update.client_id.clone(), update.client_secret.clone())
                else {
                    return Err(StockSyncError::InvalidInput("client id and secret required".into()));
                };
                let mut created = Credential {
                    client_id,
                    client_secret,
                    access_token: None,
                    refresh_token: None,
                    token_expires_at: None,
                    is_active: true,
                    last_notification_sent_at: None,
                    updated_at: now,
                };
                update.apply_to(&mut created, now);
                *slot = Some(created.clone());
                created
            }
        };
        Ok(credential)
    }
}
