//! # Ledger Repository
//!
//! Reads over the append-only `stock_transactions` table.
//!
//! Rows are written only by [`insert_entry`], always on the same transaction
//! as the stock change they record. The schema rejects UPDATE and DELETE.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use tally_core::StockTransaction;

const LEDGER_COLUMNS: &str =
    "id, tenant_id, product_id, quantity, transaction_type, note, created_by, created_at";

/// Appends one ledger row on an open connection or transaction.
pub(crate) async fn insert_entry(
    conn: &mut SqliteConnection,
    entry: &StockTransaction,
) -> DbResult<()> {
    debug!(
        product_id = %entry.product_id,
        quantity = entry.quantity,
        kind = ?entry.transaction_type,
        "Appending ledger entry"
    );

    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, tenant_id, product_id, quantity, transaction_type,
            note, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.tenant_id)
    .bind(&entry.product_id)
    .bind(entry.quantity)
    .bind(entry.transaction_type)
    .bind(&entry.note)
    .bind(&entry.created_by)
    .bind(entry.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for stock ledger reads.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Ledger rows for a product, newest first.
    pub async fn history(
        &self,
        tenant_id: &str,
        product_id: &str,
        limit: u32,
    ) -> DbResult<Vec<StockTransaction>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM stock_transactions \
             WHERE tenant_id = ?1 AND product_id = ?2 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        );

        let rows = sqlx::query_as::<_, StockTransaction>(&sql)
            .bind(tenant_id)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Ledger rows whose note is exactly `reference`, in insertion order.
    ///
    /// SALE rows are noted `Sale <sale_number>`, so this returns the stock
    /// movements of one sale.
    pub async fn for_reference(
        &self,
        tenant_id: &str,
        reference: &str,
    ) -> DbResult<Vec<StockTransaction>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} FROM stock_transactions \
             WHERE tenant_id = ?1 AND note = ?2 \
             ORDER BY rowid"
        );

        let rows = sqlx::query_as::<_, StockTransaction>(&sql)
            .bind(tenant_id)
            .bind(reference)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Σ of all deltas recorded for a product (0 when there are none).
    pub async fn balance(&self, tenant_id: &str, product_id: &str) -> DbResult<i64> {
        let balance: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM stock_transactions \
             WHERE tenant_id = ?1 AND product_id = ?2",
        )
        .bind(tenant_id)
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
