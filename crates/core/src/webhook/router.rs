//! Per-resource webhook handlers
//!
//! Every handler is an idempotent upsert or tombstone write keyed by the
//! ERP id and stamped with the event time, so replays and out-of-order
//! deliveries converge on the newest state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stocksync_domain::bling::{
    EstoqueEventoDto, IdRef, PedidoVendaDto, ProdutoDto, ProdutoFornecedorDto, SaldoDto,
};
use stocksync_domain::{IntegrationError, WebhookAction, WebhookResource};
use tracing::debug;

use crate::catalog_ports::CatalogStore;

type HandlerResult = Result<(), IntegrationError>;

/// Dispatches decoded events to the handler for their resource.
#[derive(Clone)]
pub struct WebhookRouter {
    catalog: Arc<dyn CatalogStore>,
}

impl WebhookRouter {
    /// Router applying events to `catalog`.
    pub fn new(catalog: Arc<dyn CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Apply one event. Unknown resources or actions are handler errors.
    pub async fn dispatch(
        &self,
        resource: &str,
        action: &str,
        data: &Value,
        event_time: DateTime<Utc>,
    ) -> HandlerResult {
        let (Some(resource), Some(action)) =
            (WebhookResource::parse(resource), WebhookAction::parse(action))
        else {
            return Err(IntegrationError::Handler(format!(
                "unsupported webhook event: {resource}.{action}"
            )));
        };

        debug!(resource = %resource, action = %action, "Dispatching webhook event");
        match resource {
            WebhookResource::Product => self.product(action, data, event_time).await,
            WebhookResource::Stock => self.stock(data, event_time).await,
            WebhookResource::VirtualStock => self.virtual_stock(data, event_time).await,
            WebhookResource::Order => self.order(action, data, event_time).await,
            WebhookResource::ProductSupplier => {
                self.product_supplier(action, data, event_time).await
            }
        }
    }

    async fn product(&self, action: WebhookAction, data: &Value, at: DateTime<Utc>) -> HandlerResult {
        if action == WebhookAction::Deleted {
            let IdRef { id } = payload(data, "product")?;
            self.catalog.delete_product(id, at).await.map_err(store_error)?;
            return Ok(());
        }
        let dto: ProdutoDto = payload(data, "product")?;
        self.catalog.upsert_product(&dto.into_product(at)).await.map_err(store_error)?;
        Ok(())
    }

    /// Stock movements of any action carry the balances after the movement.
    async fn stock(&self, data: &Value, at: DateTime<Utc>) -> HandlerResult {
        let dto: EstoqueEventoDto = payload(data, "stock")?;
        if let Some(deposit) = dto.deposit(at) {
            self.catalog.upsert_deposit_stock(&deposit).await.map_err(store_error)?;
        }
        if let Some(balance) = dto.balance(at) {
            self.catalog.upsert_stock_balance(&balance).await.map_err(store_error)?;
        }
        Ok(())
    }

    async fn virtual_stock(&self, data: &Value, at: DateTime<Utc>) -> HandlerResult {
        let dto: SaldoDto = payload(data, "virtual stock")?;
        if let Some(balance) = dto.balance(at) {
            self.catalog.upsert_stock_balance(&balance).await.map_err(store_error)?;
        }
        for deposit in dto.deposits(at) {
            self.catalog.upsert_deposit_stock(&deposit).await.map_err(store_error)?;
        }
        Ok(())
    }

    async fn order(&self, action: WebhookAction, data: &Value, at: DateTime<Utc>) -> HandlerResult {
        if action == WebhookAction::Deleted {
            let IdRef { id } = payload(data, "order")?;
            self.catalog.delete_sales_order(id, at).await.map_err(store_error)?;
            return Ok(());
        }
        let dto: PedidoVendaDto = payload(data, "order")?;
        self.catalog.upsert_sales_order(&dto.into_sales_order(at)).await.map_err(store_error)?;
        Ok(())
    }

    async fn product_supplier(
        &self,
        action: WebhookAction,
        data: &Value,
        at: DateTime<Utc>,
    ) -> HandlerResult {
        if action == WebhookAction::Deleted {
            let IdRef { id } = payload(data, "product supplier")?;
            self.catalog.delete_product_supplier(id, at).await.map_err(store_error)?;
            return Ok(());
        }
        let dto: ProdutoFornecedorDto = payload(data, "product supplier")?;
        self.catalog
            .upsert_product_supplier(&dto.into_product_supplier(at))
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

fn payload<T: DeserializeOwned>(data: &Value, what: &str) -> Result<T, IntegrationError> {
    T::deserialize(data)
        .map_err(|err| IntegrationError::Handler(format!("invalid {what} payload: {err}")))
}

fn store_error(err: stocksync_domain::StockSyncError) -> IntegrationError {
    IntegrationError::Handler(format!("store write failed: {err}"))
}
