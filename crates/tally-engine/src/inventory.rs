//! # Inventory Service
//!
//! Stock movements that are not sales: supplier restocks and manual
//! corrections. Also the read side of the ledger (history and
//! reconciliation).
//!
//! Every movement is one unit of work: a guarded stock update plus one
//! ledger row. SALE rows are written only by
//! [`SaleService`](crate::SaleService).

use chrono::Utc;
use serde::Serialize;
use tally_core::{
    InventoryStore, StockChange, StockTransaction, TenantContext, TransactionType, UnitOfWork,
    ValidationError,
};
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{EngineResult, SaleError};

/// A recorded movement and the stock it left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub entry: StockTransaction,
    pub new_stock: i64,
}

/// Stock on hand compared with the sum of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub product_id: String,
    pub current_stock: i64,
    pub ledger_balance: i64,
    /// `current_stock - ledger_balance`. Zero when consistent.
    pub drift: i64,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0
    }
}

/// Restocks, adjustments and ledger queries for one store.
#[derive(Debug, Clone)]
pub struct InventoryService<S> {
    store: S,
}

impl<S: InventoryStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        InventoryService { store }
    }

    /// Records a PURCHASE (`delta > 0`) or ADJUSTMENT (`delta != 0`).
    ///
    /// ## Returns
    /// * `Err(SaleError::Validation)` - SALE kind, or a delta of the wrong sign
    /// * `Err(SaleError::NotFound)` - No such product for the tenant
    /// * `Err(SaleError::InsufficientStock)` - The delta would take stock below zero
    pub async fn record_movement(
        &self,
        ctx: &TenantContext,
        product_id: &str,
        delta: i64,
        kind: TransactionType,
        note: Option<String>,
    ) -> EngineResult<StockMovement> {
        match kind {
            TransactionType::Sale => {
                return Err(ValidationError::NotAllowed {
                    field: "transactionType".to_string(),
                    allowed: vec!["PURCHASE".to_string(), "ADJUSTMENT".to_string()],
                }
                .into())
            }
            TransactionType::Purchase if delta <= 0 => {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into())
            }
            TransactionType::Adjustment if delta == 0 => {
                return Err(ValidationError::MustBeNonZero {
                    field: "quantity".to_string(),
                }
                .into())
            }
            _ => {}
        }

        let entry = StockTransaction {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            product_id: product_id.to_string(),
            quantity: delta,
            transaction_type: kind,
            note,
            created_by: ctx.requester_id.clone(),
            created_at: Utc::now(),
        };

        let mut work = self.store.begin().await?;
        let new_stock = match apply_movement(&mut work, &entry).await {
            Ok(new_stock) => new_stock,
            Err(err) => {
                if let Err(rollback_err) = work.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection discards the transaction");
                }
                return Err(err);
            }
        };
        work.commit().await?;

        info!(
            tenant_id = %ctx.tenant_id,
            product_id = %product_id,
            delta,
            kind = ?kind,
            new_stock,
            "Stock movement recorded"
        );

        Ok(StockMovement { entry, new_stock })
    }

    /// Ledger rows of a product, newest first.
    pub async fn history(
        &self,
        ctx: &TenantContext,
        product_id: &str,
        limit: u32,
    ) -> EngineResult<Vec<StockTransaction>> {
        self.require_product(ctx, product_id).await?;
        Ok(self
            .store
            .stock_history(&ctx.tenant_id, product_id, limit)
            .await?)
    }

    /// Compares `current_stock` with the ledger sum.
    pub async fn reconcile(
        &self,
        ctx: &TenantContext,
        product_id: &str,
    ) -> EngineResult<Reconciliation> {
        let current_stock = self.require_product(ctx, product_id).await?;
        let ledger_balance = self.store.ledger_balance(&ctx.tenant_id, product_id).await?;

        let report = Reconciliation {
            product_id: product_id.to_string(),
            current_stock,
            ledger_balance,
            drift: current_stock - ledger_balance,
        };

        if report.is_consistent() {
            debug!(tenant_id = %ctx.tenant_id, product_id = %product_id, "Ledger consistent");
        } else {
            warn!(
                tenant_id = %ctx.tenant_id,
                product_id = %product_id,
                current_stock,
                ledger_balance,
                drift = report.drift,
                "Stock drifted from ledger"
            );
        }

        Ok(report)
    }

    /// Current stock of the product, or NotFound.
    async fn require_product(&self, ctx: &TenantContext, product_id: &str) -> EngineResult<i64> {
        self.store
            .find_product(&ctx.tenant_id, product_id)
            .await?
            .map(|p| p.current_stock)
            .ok_or_else(|| SaleError::product_not_found(product_id))
    }
}

async fn apply_movement<W: UnitOfWork>(work: &mut W, entry: &StockTransaction) -> EngineResult<i64> {
    let new_stock = match work
        .apply_stock_delta(&entry.tenant_id, &entry.product_id, entry.quantity)
        .await?
    {
        StockChange::Applied { new_stock, .. } => new_stock,
        StockChange::Insufficient {
            product_name,
            available,
        } => {
            return Err(SaleError::InsufficientStock {
                product: product_name,
                available,
                requested: -entry.quantity,
            })
        }
        StockChange::NotFound => return Err(SaleError::product_not_found(entry.product_id.as_str())),
    };

    work.append_stock_transaction(entry).await?;
    Ok(new_stock)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, seed_product, seller};
    use crate::{EngineConfig, SaleService};
    use tally_core::{CartLine, CreateSaleRequest};

    #[tokio::test]
    async fn test_purchase_increases_stock_and_appends_ledger() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Rice", 500, 400, 3).await;
        let inventory = InventoryService::new(db.clone());

        let movement = inventory
            .record_movement(
                &seller("t-1"),
                &p.id,
                12,
                TransactionType::Purchase,
                Some("Supplier delivery".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(movement.new_stock, 15);
        assert_eq!(movement.entry.quantity, 12);
        assert_eq!(movement.entry.created_by, "t-1-seller");

        let history = inventory.history(&seller("t-1"), &p.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_type, TransactionType::Purchase);
        assert_eq!(history[0].note.as_deref(), Some("Supplier delivery"));
    }

    #[tokio::test]
    async fn test_adjustment_cannot_go_below_zero() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Oil", 900, 700, 2).await;
        let inventory = InventoryService::new(db.clone());

        let err = inventory
            .record_movement(&seller("t-1"), &p.id, -3, TransactionType::Adjustment, None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SaleError::InsufficientStock {
                product: "Oil".to_string(),
                available: 2,
                requested: 3,
            }
        );

        // Nothing recorded
        let history = inventory.history(&seller("t-1"), &p.id, 10).await.unwrap();
        assert_eq!(history.len(), 1);

        let shrink = inventory
            .record_movement(
                &seller("t-1"),
                &p.id,
                -2,
                TransactionType::Adjustment,
                Some("Damaged".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(shrink.new_stock, 0);
    }

    #[tokio::test]
    async fn test_movement_validation() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Salt", 100, 50, 5).await;
        let inventory = InventoryService::new(db.clone());
        let ctx = seller("t-1");

        let sale = inventory
            .record_movement(&ctx, &p.id, -1, TransactionType::Sale, None)
            .await
            .unwrap_err();
        assert!(matches!(
            sale,
            SaleError::Validation(ValidationError::NotAllowed { .. })
        ));

        let negative_purchase = inventory
            .record_movement(&ctx, &p.id, -1, TransactionType::Purchase, None)
            .await
            .unwrap_err();
        assert!(matches!(
            negative_purchase,
            SaleError::Validation(ValidationError::MustBePositive { .. })
        ));

        let empty_adjustment = inventory
            .record_movement(&ctx, &p.id, 0, TransactionType::Adjustment, None)
            .await
            .unwrap_err();
        assert!(matches!(
            empty_adjustment,
            SaleError::Validation(ValidationError::MustBeNonZero { .. })
        ));

        let missing = inventory
            .record_movement(&ctx, "no-such-product", 1, TransactionType::Purchase, None)
            .await
            .unwrap_err();
        assert_eq!(missing, SaleError::product_not_found("no-such-product"));
    }

    #[tokio::test]
    async fn test_other_tenant_product_is_invisible() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-2", "Theirs", 100, 50, 5).await;
        let inventory = InventoryService::new(db.clone());

        let err = inventory.history(&seller("t-1"), &p.id, 10).await.unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);

        let err = inventory
            .record_movement(&seller("t-1"), &p.id, 1, TransactionType::Purchase, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_reconcile_after_sales_and_adjustments() {
        let db = memory_db().await;
        let a = seed_product(&db, "t-1", "A", 300, 200, 10).await;
        let b = seed_product(&db, "t-1", "B", 700, 500, 4).await;
        let inventory = InventoryService::new(db.clone());
        let sales = SaleService::new(db.clone(), EngineConfig::default());
        let ctx = seller("t-1");

        sales
            .create_sale(
                &ctx,
                CreateSaleRequest {
                    lines: vec![CartLine::new(&a.id, 3), CartLine::new(&b.id, 4)],
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        inventory
            .record_movement(&ctx, &b.id, 6, TransactionType::Purchase, None)
            .await
            .unwrap();
        inventory
            .record_movement(&ctx, &a.id, -1, TransactionType::Adjustment, None)
            .await
            .unwrap();

        let ra = inventory.reconcile(&ctx, &a.id).await.unwrap();
        assert_eq!(ra.current_stock, 6);
        assert_eq!(ra.ledger_balance, 6);
        assert!(ra.is_consistent());

        let rb = inventory.reconcile(&ctx, &b.id).await.unwrap();
        assert_eq!(rb.current_stock, 6);
        assert_eq!(rb.drift, 0);
    }

    #[tokio::test]
    async fn test_reconcile_reports_drift() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Drifty", 100, 50, 5).await;

        // An out-of-band write that bypasses the ledger
        bump_stock_without_ledger(&db, &p.id).await;

        let report = InventoryService::new(db.clone())
            .reconcile(&seller("t-1"), &p.id)
            .await
            .unwrap();
        assert_eq!(report.current_stock, 8);
        assert_eq!(report.ledger_balance, 5);
        assert_eq!(report.drift, 3);
    }

    /// Raises stock by 3 through a unit of work without a ledger row.
    async fn bump_stock_without_ledger(db: &tally_db::Database, product_id: &str) {
        let mut work = db.begin().await.unwrap();
        work.apply_stock_delta("t-1", product_id, 3).await.unwrap();
        work.commit().await.unwrap();
    }
}
