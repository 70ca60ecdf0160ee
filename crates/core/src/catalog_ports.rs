//! Port for the local mirror of ERP catalog entities
//!
//! Writes are last-write-wins on `source_updated_at` and idempotent. They
//! return `false` when a newer version (or a newer tombstone) is already
//! stored. Deletes leave tombstones so an older upsert arriving late cannot
//! resurrect the entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stocksync_domain::{DepositStock, Product, ProductSupplier, Result, SalesOrder, StockBalance};

/// Local catalog mirror.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Store a product unless a newer version exists
    async fn upsert_product(&self, product: &Product) -> Result<bool>;

    /// Tombstone a product
    async fn delete_product(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool>;

    /// Store product stock totals
    async fn upsert_stock_balance(&self, balance: &StockBalance) -> Result<bool>;

    /// Store one deposit's balance
    async fn upsert_deposit_stock(&self, stock: &DepositStock) -> Result<bool>;

    /// Store a sales order header
    async fn upsert_sales_order(&self, order: &SalesOrder) -> Result<bool>;

    /// Tombstone a sales order
    async fn delete_sales_order(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool>;

    /// Store a product-supplier link
    async fn upsert_product_supplier(&self, link: &ProductSupplier) -> Result<bool>;

    /// Tombstone a product-supplier link
    async fn delete_product_supplier(&self, bling_id: i64, deleted_at: DateTime<Utc>)
        -> Result<bool>;

    /// ERP ids of all live (non-deleted) products
    async fn list_product_ids(&self) -> Result<Vec<i64>>;
}
