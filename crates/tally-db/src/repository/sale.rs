//! # Sale Repository
//!
//! Read access to committed sales and their items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. WRITTEN ONCE (unit of work, store.rs)                              │
//! │     └── insert_sale() → sales row + sale_items rows                    │
//! │         on the same transaction as the stock decrements                │
//! │                                                                         │
//! │  2. READ (this repository)                                             │
//! │     └── get_by_number() / get_with_items() / list_between()            │
//! │                                                                         │
//! │  There is no update, void, or delete: the schema rejects UPDATE on     │
//! │  sales and sale_items.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::{Sale, SaleItem, SaleWithItems};

const SALE_COLUMNS: &str = "id, tenant_id, sale_number, customer_id, subtotal_cents, \
    discount_type, discount_value, discount_cents, total_cents, profit_cents, \
    created_by, created_at";

const SALE_ITEM_COLUMNS: &str = "id, sale_id, product_id, product_name, quantity, \
    purchase_price_cents, selling_price_cents, subtotal_cents, profit_cents, created_at";

/// Inserts a sale and its items on an open transaction.
///
/// A duplicate `(tenant_id, sale_number)` fails with
/// `DbError::UniqueViolation` naming `sales.sale_number`.
pub(crate) async fn insert_sale(
    conn: &mut SqliteConnection,
    sale: &Sale,
    items: &[SaleItem],
) -> DbResult<()> {
    debug!(id = %sale.id, sale_number = %sale.sale_number, items = items.len(), "Inserting sale");

    sqlx::query(
        r#"
        INSERT INTO sales (
            id, tenant_id, sale_number, customer_id,
            subtotal_cents, discount_type, discount_value, discount_cents,
            total_cents, profit_cents, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&sale.id)
    .bind(&sale.tenant_id)
    .bind(&sale.sale_number)
    .bind(&sale.customer_id)
    .bind(sale.subtotal_cents)
    .bind(sale.discount_type)
    .bind(sale.discount_value)
    .bind(sale.discount_cents)
    .bind(sale.total_cents)
    .bind(sale.profit_cents)
    .bind(&sale.created_by)
    .bind(sale.created_at)
    .execute(&mut *conn)
    .await?;

    for item in items {
        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, product_name, quantity,
                purchase_price_cents, selling_price_cents,
                subtotal_cents, profit_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.product_name)
        .bind(item.quantity)
        .bind(item.purchase_price_cents)
        .bind(item.selling_price_cents)
        .bind(item.subtotal_cents)
        .bind(item.profit_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Repository for sale reads.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1 AND tenant_id = ?2");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Gets a sale by its human-readable number.
    pub async fn get_by_number(&self, tenant_id: &str, sale_number: &str) -> DbResult<Option<Sale>> {
        let sql =
            format!("SELECT {SALE_COLUMNS} FROM sales WHERE tenant_id = ?1 AND sale_number = ?2");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(sale_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(sale)
    }

    /// Items of a sale, in cart order. Empty when the sale belongs to another
    /// tenant.
    pub async fn items_for(&self, tenant_id: &str, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let sql = format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items \
             WHERE sale_id = ?2 \
               AND EXISTS (SELECT 1 FROM sales s WHERE s.id = sale_items.sale_id AND s.tenant_id = ?1) \
             ORDER BY rowid"
        );

        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(tenant_id)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// A sale with its items, for invoice rendering.
    pub async fn get_with_items(
        &self,
        tenant_id: &str,
        sale_id: &str,
    ) -> DbResult<Option<SaleWithItems>> {
        let Some(sale) = self.get_by_id(tenant_id, sale_id).await? else {
            return Ok(None);
        };
        let items = self.items_for(tenant_id, &sale.id).await?;

        Ok(Some(SaleWithItems { sale, items }))
    }

    /// Sales created in `[from, to)`, oldest first.
    pub async fn list_between(
        &self,
        tenant_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Sale>> {
        debug!(tenant_id = %tenant_id, %from, %to, "Listing sales");

        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales \
             WHERE tenant_id = ?1 AND created_at >= ?2 AND created_at < ?3 \
             ORDER BY created_at, rowid"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(tenant_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Greatest sale number of the tenant starting with `day_prefix`.
    ///
    /// Orders by length before text so that `…-1000` sorts after `…-999`.
    pub async fn last_number_with_prefix(
        &self,
        tenant_id: &str,
        day_prefix: &str,
    ) -> DbResult<Option<String>> {
        let last: Option<String> = sqlx::query_scalar(
            r#"
            SELECT sale_number FROM sales
            WHERE tenant_id = ?1 AND substr(sale_number, 1, length(?2)) = ?2
            ORDER BY length(sale_number) DESC, sale_number DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(day_prefix)
        .fetch_optional(&self.pool)
        .await?;

        Ok(last)
    }

    /// Counts the tenant's sales.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE tenant_id = ?1")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
