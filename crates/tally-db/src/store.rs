//! # InventoryStore for SQLite
//!
//! Implements the storage contract from `tally_core::store` on [`Database`].
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  begin()  ──► BEGIN (deferred)                                          │
//! │                                                                         │
//! │  apply_stock_delta()                                                   │
//! │     UPDATE products                                                    │
//! │        SET current_stock = current_stock + Δ                           │
//! │      WHERE id = ? AND tenant_id = ?                                    │
//! │        AND current_stock + Δ >= 0      ◄── guard evaluated on the      │
//! │                                            live row, under the lock   │
//! │     first statement is a write, so the transaction takes SQLite's      │
//! │     write lock right away and waits (busy_timeout) behind other        │
//! │     writers instead of reading a stale snapshot                        │
//! │                                                                         │
//! │  insert_sale() / append_stock_transaction()                            │
//! │                                                                         │
//! │  commit() ──► COMMIT            rollback() / drop ──► ROLLBACK         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use crate::error::DbError;
use crate::pool::Database;
use crate::repository::{ledger, sale};
use tally_core::{
    InventoryStore, Product, Sale, SaleItem, StockChange, StockTransaction, StoreResult,
    UnitOfWork,
};

#[async_trait]
impl InventoryStore for Database {
    type Work = SqliteUnitOfWork;

    async fn find_products(
        &self,
        tenant_id: &str,
        product_ids: &[String],
    ) -> StoreResult<Vec<Product>> {
        Ok(self.products().find_many(tenant_id, product_ids).await?)
    }

    async fn find_product(
        &self,
        tenant_id: &str,
        product_id: &str,
    ) -> StoreResult<Option<Product>> {
        Ok(self.products().get_by_id(tenant_id, product_id).await?)
    }

    async fn customer_belongs_to(&self, tenant_id: &str, customer_id: &str) -> StoreResult<bool> {
        let customer = self.customers().get_by_id(tenant_id, customer_id).await?;
        Ok(customer.is_some())
    }

    async fn last_sale_number(
        &self,
        tenant_id: &str,
        day_prefix: &str,
    ) -> StoreResult<Option<String>> {
        Ok(self
            .sales()
            .last_number_with_prefix(tenant_id, day_prefix)
            .await?)
    }

    async fn ledger_balance(&self, tenant_id: &str, product_id: &str) -> StoreResult<i64> {
        Ok(self.ledger().balance(tenant_id, product_id).await?)
    }

    async fn stock_history(
        &self,
        tenant_id: &str,
        product_id: &str,
        limit: u32,
    ) -> StoreResult<Vec<StockTransaction>> {
        Ok(self.ledger().history(tenant_id, product_id, limit).await?)
    }

    async fn begin(&self) -> StoreResult<Self::Work> {
        let tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(SqliteUnitOfWork { tx })
    }
}

/// One SQLite transaction.
///
/// Dropping it without calling [`UnitOfWork::commit`] rolls it back; sqlx
/// queues the ROLLBACK on the connection before it returns to the pool.
pub struct SqliteUnitOfWork {
    tx: Transaction<'static, Sqlite>,
}

impl std::fmt::Debug for SqliteUnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUnitOfWork").finish_non_exhaustive()
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    async fn apply_stock_delta(
        &mut self,
        tenant_id: &str,
        product_id: &str,
        delta: i64,
    ) -> StoreResult<StockChange> {
        let updated = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?3, updated_at = ?4
            WHERE id = ?1 AND tenant_id = ?2 AND current_stock + ?3 >= 0
            "#,
        )
        .bind(product_id)
        .bind(tenant_id)
        .bind(delta)
        .bind(Utc::now())
        .execute(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        // Same transaction and lock: this reads the row just written (or the
        // row the guard refused to touch).
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT name, current_stock FROM products WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(product_id)
        .bind(tenant_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(DbError::from)?;

        let change = match (updated.rows_affected(), row) {
            (_, None) => StockChange::NotFound,
            (0, Some((product_name, available))) => StockChange::Insufficient {
                product_name,
                available,
            },
            (_, Some((product_name, new_stock))) => StockChange::Applied {
                product_name,
                new_stock,
            },
        };

        debug!(product_id = %product_id, delta, change = ?change, "Applied stock delta");
        Ok(change)
    }

    async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> StoreResult<()> {
        sale::insert_sale(&mut *self.tx, sale, items).await?;
        Ok(())
    }

    async fn append_stock_transaction(&mut self, entry: &StockTransaction) -> StoreResult<()> {
        ledger::insert_entry(&mut *self.tx, entry).await?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
