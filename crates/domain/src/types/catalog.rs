//! Local mirror of ERP catalog entities
//!
//! Both orchestrated syncs and webhooks write these. Every write carries the
//! source timestamp it reflects; the store keeps the newest one
//! (last-write-wins), so the two channels may interleave in any order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// ERP product id
    pub bling_id: i64,
    /// SKU
    pub code: Option<String>,
    /// Display name
    pub name: String,
    /// Sale price
    pub price: Option<f64>,
    /// Cost price
    pub cost_price: Option<f64>,
    /// ERP status code (`A` active, `I` inactive)
    pub situation: Option<String>,
    /// Source timestamp this row reflects
    pub source_updated_at: DateTime<Utc>,
}

/// Product-wide stock totals across all deposits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockBalance {
    /// ERP product id
    pub product_id: i64,
    /// Physical quantity over all deposits
    pub physical_total: f64,
    /// Physical minus reserved quantity
    pub virtual_total: f64,
    /// Source timestamp this row reflects
    pub source_updated_at: DateTime<Utc>,
}

/// Stock of one product in one deposit (warehouse).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositStock {
    /// ERP product id
    pub product_id: i64,
    /// ERP deposit id
    pub deposit_id: i64,
    /// Physical quantity
    pub physical: f64,
    /// Physical minus reserved quantity
    pub virtual_quantity: f64,
    /// Source timestamp this row reflects
    pub source_updated_at: DateTime<Utc>,
}

/// Sales order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrder {
    /// ERP order id
    pub bling_id: i64,
    /// Order number shown to users
    pub number: Option<i64>,
    /// Issue date as sent (`YYYY-MM-DD`)
    pub issued_on: Option<String>,
    /// Customer name
    pub contact_name: Option<String>,
    /// Order total
    pub total: Option<f64>,
    /// ERP status id
    pub status_id: Option<i64>,
    /// Source timestamp this row reflects
    pub source_updated_at: DateTime<Utc>,
}

/// Link between a product and one of its suppliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSupplier {
    /// ERP link id
    pub bling_id: i64,
    /// ERP product id
    pub product_id: i64,
    /// ERP supplier contact id
    pub supplier_id: i64,
    /// Supplier's own code for the product
    pub supplier_code: Option<String>,
    /// Supplier cost price
    pub cost_price: Option<f64>,
    /// Preferred supplier for the product
    pub is_default: bool,
    /// Source timestamp this row reflects
    pub source_updated_at: DateTime<Utc>,
}
