//! # Storage Contract
//!
//! The traits every storage adapter implements. The engine never sees SQL;
//! it reads through [`InventoryStore`] and writes only inside a
//! [`UnitOfWork`].
//!
//! ## Unit of Work Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  store.begin() ──► UnitOfWork                                           │
//! │                      │                                                  │
//! │                      ├── apply_stock_delta(...)   guarded, row-locked   │
//! │                      ├── insert_sale(...)         may hit UNIQUE        │
//! │                      ├── append_stock_transaction(...)                  │
//! │                      │                                                  │
//! │            ┌─────────┴──────────┐                                       │
//! │            ▼                    ▼                                       │
//! │        commit(self)       rollback(self) / drop                         │
//! │     (all rows visible)   (nothing visible)                              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Adapter Requirements
//! - Dropping a `UnitOfWork` without committing MUST roll it back. The engine
//!   relies on this when a request is cancelled or times out mid-transaction.
//! - `apply_stock_delta` is the authoritative stock check: it must read and
//!   update the live row under the store's row-level isolation, never a
//!   cached snapshot.
//! - A uniqueness violation on the sale number must surface as
//!   [`StoreError::UniqueViolation`] naming the `sale_number` column.
//! - Every method takes the tenant explicitly; adapters never fall back to
//!   an ambient tenant.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{Product, Sale, SaleItem, StockTransaction};

/// Outcome of a guarded stock update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockChange {
    /// The delta was applied.
    Applied { product_name: String, new_stock: i64 },
    /// The delta would drive stock below zero; nothing changed.
    Insufficient { product_name: String, available: i64 },
    /// No such product for the tenant.
    NotFound,
}

/// Read access plus the ability to open a unit of work.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    type Work: UnitOfWork;

    /// Products of `tenant_id` among `product_ids`, active or not.
    async fn find_products(
        &self,
        tenant_id: &str,
        product_ids: &[String],
    ) -> StoreResult<Vec<Product>>;

    /// One product of `tenant_id`.
    async fn find_product(&self, tenant_id: &str, product_id: &str)
        -> StoreResult<Option<Product>>;

    /// Whether `customer_id` exists and belongs to `tenant_id`.
    async fn customer_belongs_to(&self, tenant_id: &str, customer_id: &str) -> StoreResult<bool>;

    /// Greatest sale number of the tenant starting with `day_prefix`.
    ///
    /// "Greatest" orders by length first, so `…-1000` beats `…-999`.
    async fn last_sale_number(
        &self,
        tenant_id: &str,
        day_prefix: &str,
    ) -> StoreResult<Option<String>>;

    /// Σ ledger deltas for a product.
    async fn ledger_balance(&self, tenant_id: &str, product_id: &str) -> StoreResult<i64>;

    /// Ledger rows for a product, newest first.
    async fn stock_history(
        &self,
        tenant_id: &str,
        product_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<StockTransaction>>;

    /// Opens a unit of work.
    async fn begin(&self) -> StoreResult<Self::Work>;
}

/// One atomic set of writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Adds `delta` to the product's stock unless the result would be
    /// negative.
    async fn apply_stock_delta(
        &mut self,
        tenant_id: &str,
        product_id: &str,
        delta: i64,
    ) -> StoreResult<StockChange>;

    /// Inserts a sale and all its items.
    async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> StoreResult<()>;

    /// Appends one ledger row.
    async fn append_stock_transaction(&mut self, entry: &StockTransaction) -> StoreResult<()>;

    /// Makes every write of this unit visible.
    async fn commit(self) -> StoreResult<()>;

    /// Discards every write of this unit.
    async fn rollback(self) -> StoreResult<()>;
}
