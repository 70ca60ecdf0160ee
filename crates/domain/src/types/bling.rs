//! Wire shapes of the Bling v3 API and its webhook `data` payloads
//!
//! Field names follow the vendor's Portuguese JSON. Everything that is not
//! an identifier is optional so partial webhook payloads still decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::{DepositStock, Product, ProductSupplier, SalesOrder, StockBalance};

/// `{ "data": ... }` wrapper used by every list/detail endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    /// Payload
    pub data: T,
}

/// `{ "id": ... }` reference to another entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdRef {
    /// ERP id
    pub id: i64,
}

/// Product as listed by `/produtos` and sent in `product.*` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdutoDto {
    /// Product id
    pub id: i64,
    /// Name
    #[serde(default)]
    pub nome: Option<String>,
    /// SKU
    #[serde(default)]
    pub codigo: Option<String>,
    /// Sale price
    #[serde(default)]
    pub preco: Option<f64>,
    /// Cost price
    #[serde(default)]
    pub preco_custo: Option<f64>,
    /// Status code
    #[serde(default)]
    pub situacao: Option<String>,
}

impl ProdutoDto {
    /// Map onto the local product observed at `observed_at`.
    pub fn into_product(self, observed_at: DateTime<Utc>) -> Product {
        Product {
            bling_id: self.id,
            code: self.codigo,
            name: self.nome.unwrap_or_default(),
            price: self.preco,
            cost_price: self.preco_custo,
            situation: self.situacao,
            source_updated_at: observed_at,
        }
    }
}

/// Balance of one deposit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositoSaldoDto {
    /// Deposit id
    pub id: i64,
    /// Physical quantity
    #[serde(default)]
    pub saldo_fisico: f64,
    /// Virtual quantity
    #[serde(default)]
    pub saldo_virtual: f64,
}

/// Stock balance of a product, as returned by `/estoques/saldos` and sent in
/// `virtual_stock` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaldoDto {
    /// Product reference
    pub produto: IdRef,
    /// Physical total
    #[serde(default)]
    pub saldo_fisico_total: Option<f64>,
    /// Virtual total
    #[serde(default)]
    pub saldo_virtual_total: Option<f64>,
    /// Per-deposit balances
    #[serde(default)]
    pub depositos: Vec<DepositoSaldoDto>,
}

impl SaldoDto {
    /// Product totals, when the payload carries them.
    pub fn balance(&self, observed_at: DateTime<Utc>) -> Option<StockBalance> {
        if self.saldo_fisico_total.is_none() && self.saldo_virtual_total.is_none() {
            return None;
        }
        Some(StockBalance {
            product_id: self.produto.id,
            physical_total: self.saldo_fisico_total.unwrap_or_default(),
            virtual_total: self.saldo_virtual_total.unwrap_or_default(),
            source_updated_at: observed_at,
        })
    }

    /// Per-deposit rows.
    pub fn deposits(&self, observed_at: DateTime<Utc>) -> Vec<DepositStock> {
        self.depositos
            .iter()
            .map(|deposito| DepositStock {
                product_id: self.produto.id,
                deposit_id: deposito.id,
                physical: deposito.saldo_fisico,
                virtual_quantity: deposito.saldo_virtual,
                source_updated_at: observed_at,
            })
            .collect()
    }
}

/// `data` of a `stock.*` event: one deposit's movement plus optional totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstoqueEventoDto {
    /// Product reference
    pub produto: IdRef,
    /// Affected deposit
    #[serde(default)]
    pub deposito: Option<DepositoSaldoDto>,
    /// Physical total after the movement
    #[serde(default)]
    pub saldo_fisico_total: Option<f64>,
    /// Virtual total after the movement
    #[serde(default)]
    pub saldo_virtual_total: Option<f64>,
}

impl EstoqueEventoDto {
    /// Deposit row, when the event names a deposit.
    pub fn deposit(&self, observed_at: DateTime<Utc>) -> Option<DepositStock> {
        self.deposito.map(|deposito| DepositStock {
            product_id: self.produto.id,
            deposit_id: deposito.id,
            physical: deposito.saldo_fisico,
            virtual_quantity: deposito.saldo_virtual,
            source_updated_at: observed_at,
        })
    }

    /// Product totals, when the event carries them.
    pub fn balance(&self, observed_at: DateTime<Utc>) -> Option<StockBalance> {
        SaldoDto {
            produto: self.produto,
            saldo_fisico_total: self.saldo_fisico_total,
            saldo_virtual_total: self.saldo_virtual_total,
            depositos: Vec::new(),
        }
        .balance(observed_at)
    }
}

/// Contact reference with its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContatoRef {
    /// Contact id
    pub id: i64,
    /// Display name
    #[serde(default)]
    pub nome: Option<String>,
}

/// Sales order as listed by `/pedidos/vendas` and sent in `order.*` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PedidoVendaDto {
    /// Order id
    pub id: i64,
    /// Order number
    #[serde(default)]
    pub numero: Option<i64>,
    /// Issue date
    #[serde(default)]
    pub data: Option<String>,
    /// Order total
    #[serde(default)]
    pub total: Option<f64>,
    /// Customer
    #[serde(default)]
    pub contato: Option<ContatoRef>,
    /// Status reference
    #[serde(default)]
    pub situacao: Option<IdRef>,
}

impl PedidoVendaDto {
    /// Map onto the local order header.
    pub fn into_sales_order(self, observed_at: DateTime<Utc>) -> SalesOrder {
        SalesOrder {
            bling_id: self.id,
            number: self.numero,
            issued_on: self.data,
            contact_name: self.contato.and_then(|contato| contato.nome),
            total: self.total,
            status_id: self.situacao.map(|situacao| situacao.id),
            source_updated_at: observed_at,
        }
    }
}

/// Product-supplier link from `/produtos/fornecedores`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdutoFornecedorDto {
    /// Link id
    pub id: i64,
    /// Product reference
    pub produto: IdRef,
    /// Supplier contact reference
    pub fornecedor: IdRef,
    /// Supplier's code for the product
    #[serde(default)]
    pub codigo: Option<String>,
    /// Supplier cost price
    #[serde(default)]
    pub preco_custo: Option<f64>,
    /// Preferred supplier flag
    #[serde(default)]
    pub padrao: bool,
}

impl ProdutoFornecedorDto {
    /// Map onto the local link.
    pub fn into_product_supplier(self, observed_at: DateTime<Utc>) -> ProductSupplier {
        ProductSupplier {
            bling_id: self.id,
            product_id: self.produto.id,
            supplier_id: self.fornecedor.id,
            supplier_code: self.codigo,
            cost_price: self.preco_custo,
            is_default: self.padrao,
            source_updated_at: observed_at,
        }
    }
}
