//! # Product Repository
//!
//! Catalog reads and maintenance for one tenant at a time.
//!
//! Stock is never set directly. A new product's opening stock is recorded as
//! an ADJUSTMENT ledger row in the same transaction as the product row, so
//! the ledger of every product sums to its `current_stock` from day one.
//! Later changes go through a unit of work.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use crate::repository::ledger::insert_entry;
use tally_core::{Product, StockTransaction, TransactionType};

/// Column list matching [`Product`]'s `FromRow` layout.
pub(crate) const PRODUCT_COLUMNS: &str = "id, tenant_id, name, category_id, unit, \
    purchase_price_cents, selling_price_cents, current_stock, min_stock_level, \
    is_active, created_at, updated_at";

/// Note written on the ledger row created by [`ProductRepository::insert`].
pub const OPENING_STOCK_NOTE: &str = "Opening stock";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.get_by_id("tenant-1", "uuid-here").await?;
/// let reorder = repo.low_stock("tenant-1").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by ID, active or not.
    pub async fn get_by_id(&self, tenant_id: &str, id: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND tenant_id = ?2");

        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets every product of the tenant among `ids`, active or not.
    ///
    /// Unknown ids are simply absent from the result.
    pub async fn find_many(&self, tenant_id: &str, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        debug!(tenant_id = %tenant_id, count = ids.len(), "Loading products");

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE tenant_id = "));
        builder.push_bind(tenant_id);
        builder.push(" AND id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        separated.push_unseparated(")");

        let products = builder
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Lists active products by name.
    pub async fn list_active(&self, tenant_id: &str, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND is_active = 1 \
             ORDER BY name LIMIT ?2"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Active products at or below their `min_stock_level`, emptiest first.
    ///
    /// Alerting only: the engine never refuses a sale because of it.
    pub async fn low_stock(&self, tenant_id: &str) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE tenant_id = ?1 AND is_active = 1 AND current_stock <= min_stock_level \
             ORDER BY current_stock, name"
        );

        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        debug!(tenant_id = %tenant_id, count = products.len(), "Low stock products");
        Ok(products)
    }

    /// Inserts a new product and its opening-stock ledger row.
    ///
    /// ## Arguments
    /// * `product` - Product to insert (id generated beforehand)
    /// * `created_by` - Requester recorded on the ledger row
    ///
    /// ## Returns
    /// * `Ok(Product)` - The inserted product
    /// * `Err(DbError::UniqueViolation)` - ID already exists
    /// * `Err(DbError::CheckViolation)` - Negative opening stock
    pub async fn insert(&self, product: &Product, created_by: &str) -> DbResult<Product> {
        debug!(
            id = %product.id,
            tenant_id = %product.tenant_id,
            opening_stock = product.current_stock,
            "Inserting product"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, tenant_id, name, category_id, unit,
                purchase_price_cents, selling_price_cents,
                current_stock, min_stock_level, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&product.id)
        .bind(&product.tenant_id)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(&product.unit)
        .bind(product.purchase_price_cents)
        .bind(product.selling_price_cents)
        .bind(product.current_stock)
        .bind(product.min_stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        if product.current_stock != 0 {
            let entry = StockTransaction {
                id: generate_id(),
                tenant_id: product.tenant_id.clone(),
                product_id: product.id.clone(),
                quantity: product.current_stock,
                transaction_type: TransactionType::Adjustment,
                note: Some(OPENING_STOCK_NOTE.to_string()),
                created_by: created_by.to_string(),
                created_at: product.created_at,
            };
            insert_entry(&mut *tx, &entry).await?;
        }

        tx.commit().await?;

        Ok(product.clone())
    }

    /// Changes the prices of a product.
    ///
    /// Sales already recorded keep their own snapshot and are unaffected.
    pub async fn update_prices(
        &self,
        tenant_id: &str,
        id: &str,
        selling_price_cents: i64,
        purchase_price_cents: i64,
    ) -> DbResult<()> {
        debug!(id = %id, selling_price_cents, purchase_price_cents, "Updating product prices");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET selling_price_cents = ?3, purchase_price_cents = ?4, updated_at = ?5
            WHERE id = ?1 AND tenant_id = ?2
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(selling_price_cents)
        .bind(purchase_price_cents)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Activates or soft-deletes a product.
    ///
    /// Historical sales still reference inactive products; they are only
    /// excluded from new sales.
    pub async fn set_active(&self, tenant_id: &str, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Setting product active flag");

        let result = sqlx::query(
            "UPDATE products SET is_active = ?3, updated_at = ?4 WHERE id = ?1 AND tenant_id = ?2",
        )
        .bind(id)
        .bind(tenant_id)
        .bind(active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts the tenant's active products.
    pub async fn count(&self, tenant_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND is_active = 1",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
