//! ERP sub-syncs executed by orchestrated runs
//!
//! Each sub-sync pages through one ERP resource and upserts what it reads
//! into the catalog store. Item-level problems (undecodable records, store
//! failures on a single row) are counted as errors and skipped; any API
//! failure aborts the whole run so the orchestrator can classify it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde_json::Value;
use stocksync_common::clock::Clock;
use stocksync_domain::bling::{PedidoVendaDto, ProdutoDto, ProdutoFornecedorDto, SaldoDto};
use stocksync_domain::constants::{DEFAULT_PAGE_SIZE, SALES_LOOKBACK_DAYS, STOCK_BALANCE_BATCH_SIZE};
use stocksync_domain::{IntegrationError, SyncCounts, SyncKind};
use tracing::{debug, info, instrument, warn};

use super::ports::SyncExecutor;
use crate::catalog_ports::CatalogStore;
use crate::erp_ports::ErpApi;

type JobResult = Result<SyncCounts, IntegrationError>;

const PRODUCTS_PATH: &str = "/produtos";
const STOCK_BALANCES_PATH: &str = "/estoques/saldos";
const SALES_ORDERS_PATH: &str = "/pedidos/vendas";
const PRODUCT_SUPPLIERS_PATH: &str = "/produtos/fornecedores";

/// Paging and batching knobs for the sub-syncs.
#[derive(Debug, Clone)]
pub struct SyncJobConfig {
    /// Items requested per list page
    pub page_size: u32,
    /// Product ids per stock-balance request
    pub stock_batch_size: usize,
    /// How far back the sales-order sync reaches
    pub sales_lookback_days: i64,
    /// Hard stop for pagination in case the ERP keeps returning full pages.
    pub max_pages: u32,
}

impl Default for SyncJobConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            stock_batch_size: STOCK_BALANCE_BATCH_SIZE,
            sales_lookback_days: SALES_LOOKBACK_DAYS,
            max_pages: 1_000,
        }
    }
}

/// [`SyncExecutor`] backed by the Bling REST API.
pub struct BlingSyncExecutor {
    api: Arc<dyn ErpApi>,
    catalog: Arc<dyn CatalogStore>,
    clock: Arc<dyn Clock>,
    config: SyncJobConfig,
}

impl BlingSyncExecutor {
    /// Executor writing into `catalog`.
    pub fn new(
        api: Arc<dyn ErpApi>,
        catalog: Arc<dyn CatalogStore>,
        clock: Arc<dyn Clock>,
        config: SyncJobConfig,
    ) -> Self {
        Self { api, catalog, clock, config }
    }

    #[instrument(skip(self))]
    async fn sync_products(&self) -> JobResult {
        let mut counts = SyncCounts::default();
        for page in 1..=self.config.max_pages {
            let items = self.fetch_page(PRODUCTS_PATH, page, &[]).await?;
            let fetched = items.len();
            let observed_at = self.clock.now();

            for item in items {
                let Some(dto) = decode::<ProdutoDto>(item, "product") else {
                    counts.errors += 1;
                    continue;
                };
                record(&mut counts, self.catalog.upsert_product(&dto.into_product(observed_at)).await);
            }

            if self.is_last_page(fetched) {
                break;
            }
        }
        info!(synced = counts.synced, errors = counts.errors, "Products synced");
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn sync_inventory(&self) -> JobResult {
        let product_ids = self
            .catalog
            .list_product_ids()
            .await
            .map_err(|err| IntegrationError::Transient(format!("cannot list products: {err}")))?;

        let mut counts = SyncCounts::default();
        for batch in product_ids.chunks(self.config.stock_batch_size.max(1)) {
            let query: Vec<(String, String)> =
                batch.iter().map(|id| ("idsProdutos[]".to_string(), id.to_string())).collect();
            let response = self.api.get_json(STOCK_BALANCES_PATH, &query).await?;
            let observed_at = self.clock.now();

            for item in data_items(response)? {
                let Some(saldo) = decode::<SaldoDto>(item, "stock balance") else {
                    counts.errors += 1;
                    continue;
                };

                let mut failed = false;
                if let Some(balance) = saldo.balance(observed_at) {
                    failed |= self.catalog.upsert_stock_balance(&balance).await.is_err();
                }
                for deposit in saldo.deposits(observed_at) {
                    failed |= self.catalog.upsert_deposit_stock(&deposit).await.is_err();
                }

                if failed {
                    warn!(product_id = saldo.produto.id, "Failed to store stock balance");
                    counts.errors += 1;
                } else {
                    counts.synced += 1;
                }
            }
        }
        info!(synced = counts.synced, errors = counts.errors, "Inventory synced");
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn sync_sales(&self) -> JobResult {
        let since = (self.clock.now() - Duration::days(self.config.sales_lookback_days))
            .format("%Y-%m-%d")
            .to_string();
        let filter = [("dataInicial".to_string(), since)];

        let mut counts = SyncCounts::default();
        for page in 1..=self.config.max_pages {
            let items = self.fetch_page(SALES_ORDERS_PATH, page, &filter).await?;
            let fetched = items.len();
            let observed_at = self.clock.now();

            for item in items {
                let Some(dto) = decode::<PedidoVendaDto>(item, "sales order") else {
                    counts.errors += 1;
                    continue;
                };
                record(
                    &mut counts,
                    self.catalog.upsert_sales_order(&dto.into_sales_order(observed_at)).await,
                );
            }

            if self.is_last_page(fetched) {
                break;
            }
        }
        info!(synced = counts.synced, errors = counts.errors, "Sales orders synced");
        Ok(counts)
    }

    #[instrument(skip(self))]
    async fn sync_suppliers(&self) -> JobResult {
        let mut counts = SyncCounts::default();
        for page in 1..=self.config.max_pages {
            let items = self.fetch_page(PRODUCT_SUPPLIERS_PATH, page, &[]).await?;
            let fetched = items.len();
            let observed_at = self.clock.now();

            for item in items {
                let Some(dto) = decode::<ProdutoFornecedorDto>(item, "product supplier") else {
                    counts.errors += 1;
                    continue;
                };
                record(
                    &mut counts,
                    self.catalog
                        .upsert_product_supplier(&dto.into_product_supplier(observed_at))
                        .await,
                );
            }

            if self.is_last_page(fetched) {
                break;
            }
        }
        info!(synced = counts.synced, errors = counts.errors, "Product suppliers synced");
        Ok(counts)
    }

    async fn fetch_page(
        &self,
        path: &str,
        page: u32,
        extra: &[(String, String)],
    ) -> Result<Vec<Value>, IntegrationError> {
        let mut query = vec![
            ("pagina".to_string(), page.to_string()),
            ("limite".to_string(), self.config.page_size.to_string()),
        ];
        query.extend_from_slice(extra);

        let response = self.api.get_json(path, &query).await?;
        let items = data_items(response)?;
        debug!(path, page, count = items.len(), "Fetched page");
        Ok(items)
    }

    fn is_last_page(&self, fetched: usize) -> bool {
        fetched < self.config.page_size as usize
    }
}

#[async_trait]
impl SyncExecutor for BlingSyncExecutor {
    async fn execute(&self, kind: SyncKind) -> JobResult {
        match kind {
            SyncKind::Products => self.sync_products().await,
            SyncKind::Inventory => self.sync_inventory().await,
            SyncKind::Sales => self.sync_sales().await,
            SyncKind::Suppliers => self.sync_suppliers().await,
            SyncKind::Full => {
                let mut total = self.sync_products().await?;
                total += self.sync_inventory().await?;
                total += self.sync_sales().await?;
                Ok(total)
            }
        }
    }
}

/// Items of a `{ "data": [...] }` response.
fn data_items(response: Value) -> Result<Vec<Value>, IntegrationError> {
    match response {
        Value::Object(mut body) => match body.remove("data") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(IntegrationError::Transient(format!(
                "unexpected ERP response: data is {}",
                json_kind(&other)
            ))),
        },
        other => Err(IntegrationError::Transient(format!(
            "unexpected ERP response: body is {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode<T: DeserializeOwned>(item: Value, what: &'static str) -> Option<T> {
    match serde_json::from_value(item) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "Skipping undecodable {what}");
            None
        }
    }
}

fn record(counts: &mut SyncCounts, result: stocksync_domain::Result<bool>) {
    match result {
        Ok(_) => counts.synced += 1,
        Err(err) => {
            warn!(error = %err, "Failed to store synced item");
            counts.errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn data_items_accepts_missing_data() {
        assert!(data_items(json!({})).unwrap().is_empty());
        assert_eq!(data_items(json!({"data": [1, 2]})).unwrap().len(), 2);
    }

    #[test]
    fn data_items_rejects_non_array() {
        let err = data_items(json!({"data": "nope"})).unwrap_err();
        assert!(matches!(err, IntegrationError::Transient(_)));
    }
}
