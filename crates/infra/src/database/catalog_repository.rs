//! SQLite mirror of ERP catalog entities.
//!
//! Every write is a single `INSERT ... ON CONFLICT DO UPDATE ... WHERE`
//! statement guarded on `source_updated_at`, so the newest source version
//! wins no matter which channel (sync or webhook) delivers it, and in which
//! order. Deletes upsert a tombstone row instead of removing it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use stocksync_core::catalog_ports::CatalogStore;
use stocksync_domain::{
    DepositStock, Product, ProductSupplier, Result, SalesOrder, StockBalance,
};

use super::manager::DbManager;
use super::sql::{parse_ts, ts, with_connection};

/// SQLite-backed [`CatalogStore`].
pub struct SqliteCatalogStore {
    db: Arc<DbManager>,
}

impl SqliteCatalogStore {
    /// Store over `db`.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Live product by ERP id; tombstones read as absent.
    pub async fn get_product(&self, bling_id: i64) -> Result<Option<Product>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT bling_id, code, name, price, cost_price, situation, source_updated_at \
                 FROM products WHERE bling_id = ?1 AND deleted = 0",
                params![bling_id],
                map_product_row,
            )
            .optional()
        })
        .await
    }

    /// Stock totals of a product.
    pub async fn get_stock_balance(&self, product_id: i64) -> Result<Option<StockBalance>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT product_id, physical_total, virtual_total, source_updated_at \
                 FROM stock_balances WHERE product_id = ?1",
                params![product_id],
                |row| {
                    let at: String = row.get(3)?;
                    Ok(StockBalance {
                        product_id: row.get(0)?,
                        physical_total: row.get(1)?,
                        virtual_total: row.get(2)?,
                        source_updated_at: parse_ts(3, &at)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Live sales order by ERP id; tombstones read as absent.
    pub async fn get_sales_order(&self, bling_id: i64) -> Result<Option<SalesOrder>> {
        with_connection(&self.db, move |conn| {
            conn.query_row(
                "SELECT bling_id, number, issued_on, contact_name, total, status_id, \
                 source_updated_at FROM sales_orders WHERE bling_id = ?1 AND deleted = 0",
                params![bling_id],
                |row| {
                    let at: String = row.get(6)?;
                    Ok(SalesOrder {
                        bling_id: row.get(0)?,
                        number: row.get(1)?,
                        issued_on: row.get(2)?,
                        contact_name: row.get(3)?,
                        total: row.get(4)?,
                        status_id: row.get(5)?,
                        source_updated_at: parse_ts(6, &at)?,
                    })
                },
            )
            .optional()
        })
        .await
    }

    /// Run one guarded write; true when a row was inserted or updated.
    async fn write<F>(&self, op: F) -> Result<bool>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<usize> + Send + 'static,
    {
        let changed = with_connection(&self.db, move |conn| op(conn)).await?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn upsert_product(&self, product: &Product) -> Result<bool> {
        let p = product.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO products \
                    (bling_id, code, name, price, cost_price, situation, deleted, source_updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    code = excluded.code, name = excluded.name, price = excluded.price, \
                    cost_price = excluded.cost_price, situation = excluded.situation, \
                    deleted = 0, source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= products.source_updated_at",
                params![
                    p.bling_id,
                    p.code,
                    p.name,
                    p.price,
                    p.cost_price,
                    p.situation,
                    ts(p.source_updated_at)
                ],
            )
        })
        .await
    }

    async fn delete_product(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO products (bling_id, name, deleted, source_updated_at) \
                 VALUES (?1, '', 1, ?2) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    deleted = 1, source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= products.source_updated_at",
                params![bling_id, ts(deleted_at)],
            )
        })
        .await
    }

    async fn upsert_stock_balance(&self, balance: &StockBalance) -> Result<bool> {
        let b = balance.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO stock_balances \
                    (product_id, physical_total, virtual_total, source_updated_at) \
                 VALUES (?1, ?2, ?3, ?4) \
                 ON CONFLICT(product_id) DO UPDATE SET \
                    physical_total = excluded.physical_total, \
                    virtual_total = excluded.virtual_total, \
                    source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= stock_balances.source_updated_at",
                params![b.product_id, b.physical_total, b.virtual_total, ts(b.source_updated_at)],
            )
        })
        .await
    }

    async fn upsert_deposit_stock(&self, stock: &DepositStock) -> Result<bool> {
        let s = stock.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO stock_levels \
                    (product_id, deposit_id, physical, virtual_quantity, source_updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(product_id, deposit_id) DO UPDATE SET \
                    physical = excluded.physical, \
                    virtual_quantity = excluded.virtual_quantity, \
                    source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= stock_levels.source_updated_at",
                params![
                    s.product_id,
                    s.deposit_id,
                    s.physical,
                    s.virtual_quantity,
                    ts(s.source_updated_at)
                ],
            )
        })
        .await
    }

    async fn upsert_sales_order(&self, order: &SalesOrder) -> Result<bool> {
        let o = order.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO sales_orders \
                    (bling_id, number, issued_on, contact_name, total, status_id, deleted, \
                     source_updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    number = excluded.number, issued_on = excluded.issued_on, \
                    contact_name = excluded.contact_name, total = excluded.total, \
                    status_id = excluded.status_id, deleted = 0, \
                    source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= sales_orders.source_updated_at",
                params![
                    o.bling_id,
                    o.number,
                    o.issued_on,
                    o.contact_name,
                    o.total,
                    o.status_id,
                    ts(o.source_updated_at)
                ],
            )
        })
        .await
    }

    async fn delete_sales_order(&self, bling_id: i64, deleted_at: DateTime<Utc>) -> Result<bool> {
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO sales_orders (bling_id, deleted, source_updated_at) \
                 VALUES (?1, 1, ?2) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    deleted = 1, source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= sales_orders.source_updated_at",
                params![bling_id, ts(deleted_at)],
            )
        })
        .await
    }

    async fn upsert_product_supplier(&self, link: &ProductSupplier) -> Result<bool> {
        let l = link.clone();
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO product_suppliers \
                    (bling_id, product_id, supplier_id, supplier_code, cost_price, is_default, \
                     deleted, source_updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    product_id = excluded.product_id, supplier_id = excluded.supplier_id, \
                    supplier_code = excluded.supplier_code, cost_price = excluded.cost_price, \
                    is_default = excluded.is_default, deleted = 0, \
                    source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= product_suppliers.source_updated_at",
                params![
                    l.bling_id,
                    l.product_id,
                    l.supplier_id,
                    l.supplier_code,
                    l.cost_price,
                    l.is_default,
                    ts(l.source_updated_at)
                ],
            )
        })
        .await
    }

    async fn delete_product_supplier(
        &self,
        bling_id: i64,
        deleted_at: DateTime<Utc>,
    ) -> Result<bool> {
        // product/supplier ids are unknown for a tombstone of an unseen link
        self.write(move |conn| {
            conn.execute(
                "INSERT INTO product_suppliers \
                    (bling_id, product_id, supplier_id, deleted, source_updated_at) \
                 VALUES (?1, 0, 0, 1, ?2) \
                 ON CONFLICT(bling_id) DO UPDATE SET \
                    deleted = 1, source_updated_at = excluded.source_updated_at \
                 WHERE excluded.source_updated_at >= product_suppliers.source_updated_at",
                params![bling_id, ts(deleted_at)],
            )
        })
        .await
    }

    async fn list_product_ids(&self) -> Result<Vec<i64>> {
        with_connection(&self.db, |conn| {
            let mut stmt =
                conn.prepare("SELECT bling_id FROM products WHERE deleted = 0 ORDER BY bling_id")?;
            let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
            rows.collect()
        })
        .await
    }
}

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let at: String = row.get(6)?;
    Ok(Product {
        bling_id: row.get(0)?,
        code: row.get(1)?,
        name: row.get(2)?,
        price: row.get(3)?,
        cost_price: row.get(4)?,
        situation: row.get(5)?,
        source_updated_at: parse_ts(6, &at)?,
    })
}
