//! # Sale Service
//!
//! The single entry point that turns a cart into a committed sale.
//!
//! ## Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Validating       shape of the cart and discount, customer belongs  │
//! │                      to the tenant, every product resolves             │
//! │  2. Pricing          price_cart on the snapshot (advisory stock check) │
//! │  ┌─────────────────── attempt loop (max_sequence_retries + 1) ───────┐ │
//! │  │ 3. NumberAllocated  next INV-YYYYMMDD-NNN for the tenant           │ │
//! │  │ 4. InTransaction    one unit of work, bounded by a timeout:        │ │
//! │  │      a. guarded decrement per line (authoritative stock check)     │ │
//! │  │      b. insert Sale + SaleItems (price snapshot from step 2)       │ │
//! │  │      c. append one SALE ledger row per line                        │ │
//! │  │      d. commit                                                     │ │
//! │  │    sale number taken? → rollback, back to 3                        │ │
//! │  └────────────────────────────────────────────────────────────────────┘ │
//! │  5. Committed        SaleWithItems returned                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Anything that fails inside step 4 rolls the whole unit back. The stock
//! decrement runs first so that the unit of work holds the store's write
//! lock before anything else is written.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tally_core::validation::{parse_optional_discount, validate_cart_lines};
use tally_core::{
    price_cart, CreateSaleRequest, InventoryStore, PricedCart, Sale, SaleItem, SaleWithItems,
    StockChange, StockTransaction, StoreError, TenantContext, TransactionType, UnitOfWork,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineResult, SaleError};
use crate::sequencer::InvoiceSequencer;

/// Where a `create_sale` call currently is. Logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleStage {
    Validating,
    Pricing,
    NumberAllocated,
    InTransaction,
    Committed,
    /// Refused before any write.
    Rejected,
    /// Unit of work rolled back.
    Aborted,
}

/// Outcome of one unit of work that did not commit.
enum AttemptError {
    /// The sale number was taken by a concurrent checkout.
    Collision,
    Failed(SaleError),
}

impl From<SaleError> for AttemptError {
    fn from(err: SaleError) -> Self {
        AttemptError::Failed(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        if err.is_sale_number_collision() {
            AttemptError::Collision
        } else {
            AttemptError::Failed(err.into())
        }
    }
}

/// Creates sales against an [`InventoryStore`].
///
/// ## Usage
/// ```rust,ignore
/// let service = SaleService::new(db.clone(), EngineConfig::default());
/// let receipt = service.create_sale(&ctx, request).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleService<S> {
    store: S,
    config: EngineConfig,
    sequencer: InvoiceSequencer,
}

impl<S: InventoryStore> SaleService<S> {
    /// Creates a new SaleService.
    pub fn new(store: S, config: EngineConfig) -> Self {
        let sequencer = InvoiceSequencer::new(&config);
        SaleService {
            store,
            config,
            sequencer,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a sale for the tenant of `ctx`.
    ///
    /// ## Returns
    /// * `Ok(SaleWithItems)` - The committed sale
    /// * `Err(SaleError::Validation | NotFound | DataIntegrity)` - Nothing written
    /// * `Err(SaleError::InsufficientStock)` - Pre-check or authoritative
    ///   re-check failed; nothing written
    /// * `Err(SaleError::SequenceExhausted)` - Every attempt collided; nothing written
    /// * `Err(SaleError::Storage)` - Infrastructure failure or timeout; rolled back
    pub async fn create_sale(
        &self,
        ctx: &TenantContext,
        request: CreateSaleRequest,
    ) -> EngineResult<SaleWithItems> {
        debug!(
            tenant_id = %ctx.tenant_id,
            requester_id = %ctx.requester_id,
            role = ?ctx.role,
            lines = request.lines.len(),
            "create_sale"
        );

        let priced = match self.prepare(ctx, &request).await {
            Ok(priced) => priced,
            Err(err) => {
                self.stage(ctx, SaleStage::Rejected);
                debug!(tenant_id = %ctx.tenant_id, error = %err, "Sale rejected");
                return Err(err);
            }
        };

        let attempts = self.config.max_sequence_retries.saturating_add(1);
        for attempt in 1..=attempts {
            let now = Utc::now();
            let date = self.sequencer.business_date(now);
            let sale_number = self
                .sequencer
                .next_sale_number(&self.store, &ctx.tenant_id, date)
                .await
                .inspect_err(|err| {
                    error!(tenant_id = %ctx.tenant_id, error = %err, "Sale number lookup failed")
                })?;
            self.stage(ctx, SaleStage::NumberAllocated);

            let (sale, items, entries) =
                build_records(ctx, &request, &priced, &sale_number, now);

            self.stage(ctx, SaleStage::InTransaction);
            let outcome = tokio::time::timeout(
                self.config.transaction_timeout,
                self.write(ctx, &sale, &items, &entries),
            )
            .await;

            match outcome {
                Ok(Ok(())) => {
                    self.stage(ctx, SaleStage::Committed);
                    info!(
                        tenant_id = %ctx.tenant_id,
                        sale_number = %sale.sale_number,
                        total_cents = sale.total_cents,
                        items = items.len(),
                        attempt,
                        "Sale committed"
                    );
                    return Ok(SaleWithItems { sale, items });
                }
                Ok(Err(AttemptError::Collision)) => {
                    self.stage(ctx, SaleStage::Aborted);
                    warn!(
                        tenant_id = %ctx.tenant_id,
                        sale_number = %sale_number,
                        attempt,
                        attempts,
                        "Sale number taken by a concurrent sale, retrying"
                    );
                }
                Ok(Err(AttemptError::Failed(err))) => {
                    self.stage(ctx, SaleStage::Aborted);
                    if matches!(err, SaleError::Storage(_)) {
                        error!(
                            tenant_id = %ctx.tenant_id,
                            error = %err,
                            "Sale aborted by storage failure"
                        );
                    } else {
                        debug!(tenant_id = %ctx.tenant_id, error = %err, "Sale aborted");
                    }
                    return Err(err);
                }
                Err(_elapsed) => {
                    // The unit of work was dropped mid-flight, which rolls it back.
                    self.stage(ctx, SaleStage::Aborted);
                    error!(
                        tenant_id = %ctx.tenant_id,
                        timeout = ?self.config.transaction_timeout,
                        "Sale unit of work timed out"
                    );
                    return Err(SaleError::Storage(format!(
                        "unit of work timed out after {:?}",
                        self.config.transaction_timeout
                    )));
                }
            }
        }

        warn!(tenant_id = %ctx.tenant_id, attempts, "Sale number retries exhausted");
        Err(SaleError::SequenceExhausted { attempts })
    }

    /// Steps 1 and 2: everything decided before a unit of work is opened.
    async fn prepare(
        &self,
        ctx: &TenantContext,
        request: &CreateSaleRequest,
    ) -> EngineResult<PricedCart> {
        self.stage(ctx, SaleStage::Validating);

        validate_cart_lines(&request.lines)?;
        let discount = parse_optional_discount(request.discount.as_ref())?;

        if let Some(customer_id) = &request.customer_id {
            if !self
                .store
                .customer_belongs_to(&ctx.tenant_id, customer_id)
                .await?
            {
                return Err(SaleError::customer_not_found(customer_id));
            }
        }

        let ids: Vec<String> = request.lines.iter().map(|l| l.product_id.clone()).collect();
        let products = self.store.find_products(&ctx.tenant_id, &ids).await?;

        let sellable: HashSet<&str> = products
            .iter()
            .filter(|p| p.is_active)
            .map(|p| p.id.as_str())
            .collect();
        if let Some(missing) = ids.iter().find(|id| !sellable.contains(id.as_str())) {
            return Err(SaleError::product_not_found(missing.as_str()));
        }

        self.stage(ctx, SaleStage::Pricing);
        let priced = price_cart(&products, &request.lines, discount)?;

        debug!(
            tenant_id = %ctx.tenant_id,
            subtotal = %priced.subtotal,
            discount = %priced.discount_amount,
            total = %priced.total,
            "Cart priced"
        );
        Ok(priced)
    }

    /// Step 4: one unit of work, rolled back on any failure.
    async fn write(
        &self,
        ctx: &TenantContext,
        sale: &Sale,
        items: &[SaleItem],
        entries: &[StockTransaction],
    ) -> Result<(), AttemptError> {
        let mut work = self.store.begin().await.map_err(SaleError::from)?;

        match apply(&mut work, ctx, sale, items, entries).await {
            Ok(()) => {
                work.commit().await.map_err(SaleError::from)?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = work.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed; connection discards the transaction");
                }
                Err(err)
            }
        }
    }

    fn stage(&self, ctx: &TenantContext, stage: SaleStage) {
        debug!(tenant_id = %ctx.tenant_id, stage = ?stage, "Sale stage");
    }
}

/// Writes of one attempt, in lock-friendly order.
async fn apply<W: UnitOfWork>(
    work: &mut W,
    ctx: &TenantContext,
    sale: &Sale,
    items: &[SaleItem],
    entries: &[StockTransaction],
) -> Result<(), AttemptError> {
    for item in items {
        match work
            .apply_stock_delta(&ctx.tenant_id, &item.product_id, -item.quantity)
            .await?
        {
            StockChange::Applied { .. } => {}
            StockChange::Insufficient {
                product_name,
                available,
            } => {
                return Err(SaleError::InsufficientStock {
                    product: product_name,
                    available,
                    requested: item.quantity,
                }
                .into())
            }
            StockChange::NotFound => {
                return Err(SaleError::product_not_found(item.product_id.as_str()).into())
            }
        }
    }

    work.insert_sale(sale, items).await?;

    for entry in entries {
        work.append_stock_transaction(entry).await?;
    }

    Ok(())
}

/// Builds the rows of one attempt. Ids are fresh on every attempt.
fn build_records(
    ctx: &TenantContext,
    request: &CreateSaleRequest,
    priced: &PricedCart,
    sale_number: &str,
    now: DateTime<Utc>,
) -> (Sale, Vec<SaleItem>, Vec<StockTransaction>) {
    let sale_id = Uuid::new_v4().to_string();

    let sale = Sale {
        id: sale_id.clone(),
        tenant_id: ctx.tenant_id.clone(),
        sale_number: sale_number.to_string(),
        customer_id: request.customer_id.clone(),
        subtotal_cents: priced.subtotal.cents(),
        discount_type: priced.discount.map(|d| d.discount_type()),
        discount_value: priced.discount.map(|d| d.raw_value()),
        discount_cents: priced.discount_amount.cents(),
        total_cents: priced.total.cents(),
        profit_cents: priced.profit.cents(),
        created_by: ctx.requester_id.clone(),
        created_at: now,
    };

    let items: Vec<SaleItem> = priced
        .lines
        .iter()
        .map(|line| SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.clone(),
            product_id: line.product_id.clone(),
            product_name: line.product_name.clone(),
            quantity: line.quantity,
            purchase_price_cents: line.purchase_price.cents(),
            selling_price_cents: line.selling_price.cents(),
            subtotal_cents: line.subtotal.cents(),
            profit_cents: line.profit.cents(),
            created_at: now,
        })
        .collect();

    let note = format!("Sale {sale_number}");
    let entries: Vec<StockTransaction> = priced
        .lines
        .iter()
        .map(|line| StockTransaction {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            product_id: line.product_id.clone(),
            quantity: -line.quantity,
            transaction_type: TransactionType::Sale,
            note: Some(note.clone()),
            created_by: ctx.requester_id.clone(),
            created_at: now,
        })
        .collect();

    (sale, items, entries)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_db, seed_product, seller};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tally_core::invoice::is_well_formed;
    use tally_core::{
        CartLine, Customer, DiscountInstruction, DiscountType, Product, StoreResult,
        ValidationError,
    };
    use tally_db::{Database, DbConfig, SqliteUnitOfWork};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn request(lines: Vec<CartLine>) -> CreateSaleRequest {
        CreateSaleRequest {
            lines,
            ..Default::default()
        }
    }

    async fn stock_of(db: &Database, tenant_id: &str, product_id: &str) -> i64 {
        db.products()
            .get_by_id(tenant_id, product_id)
            .await
            .unwrap()
            .unwrap()
            .current_stock
    }

    #[tokio::test]
    async fn test_reference_sale() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Rice 5kg", 5000, 4000, 5).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());

        let result = service
            .create_sale(
                &seller("t-1"),
                CreateSaleRequest {
                    customer_id: None,
                    lines: vec![CartLine::new(&p.id, 2)],
                    discount: Some(DiscountInstruction::percentage(10)),
                },
            )
            .await
            .unwrap();

        let sale = &result.sale;
        assert_eq!(sale.subtotal_cents, 10000);
        assert_eq!(sale.discount_cents, 1000);
        assert_eq!(sale.total_cents, 9000);
        assert_eq!(sale.profit_cents, 2000);
        assert_eq!(sale.discount_type, Some(DiscountType::Percentage));
        assert_eq!(sale.discount_value, Some(10));
        assert_eq!(sale.created_by, "t-1-seller");
        assert!(is_well_formed("INV", &sale.sale_number));

        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].product_name, "Rice 5kg");
        assert_eq!(result.items[0].quantity, 2);

        assert_eq!(stock_of(&db, "t-1", &p.id).await, 3);

        let movements = db
            .ledger()
            .for_reference("t-1", &format!("Sale {}", sale.sale_number))
            .await
            .unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, -2);
        assert_eq!(movements[0].transaction_type, TransactionType::Sale);

        // What was returned is what was stored
        let stored = db.sales().get_with_items("t-1", &sale.id).await.unwrap().unwrap();
        assert_eq!(stored.sale.sale_number, sale.sale_number);
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_one_ledger_row_per_line() {
        let db = memory_db().await;
        let a = seed_product(&db, "t-1", "A", 100, 60, 10).await;
        let b = seed_product(&db, "t-1", "B", 250, 100, 10).await;
        let c = seed_product(&db, "t-1", "C", 999, 500, 10).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());

        let result = service
            .create_sale(
                &seller("t-1"),
                request(vec![
                    CartLine::new(&a.id, 1),
                    CartLine::new(&b.id, 2),
                    CartLine::new(&c.id, 3),
                ]),
            )
            .await
            .unwrap();

        let movements = db
            .ledger()
            .for_reference("t-1", &format!("Sale {}", result.sale.sale_number))
            .await
            .unwrap();
        assert_eq!(movements.len(), 3);
        let deltas: Vec<(String, i64)> = movements
            .iter()
            .map(|m| (m.product_id.clone(), m.quantity))
            .collect();
        assert!(deltas.contains(&(a.id.clone(), -1)));
        assert!(deltas.contains(&(b.id.clone(), -2)));
        assert!(deltas.contains(&(c.id.clone(), -3)));

        assert_eq!(result.sale.subtotal_cents, 100 + 500 + 2997);
        assert_eq!(result.sale.total_cents, result.sale.subtotal_cents);
        assert_eq!(result.sale.profit_cents, 40 + 300 + 1497);
    }

    #[tokio::test]
    async fn test_duplicate_product_rejected_before_any_write() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 100, 50, 10).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());

        let err = service
            .create_sale(
                &seller("t-1"),
                request(vec![CartLine::new(&p.id, 1), CartLine::new(&p.id, 2)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SaleError::Validation(ValidationError::Duplicate { .. })
        ));
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 10);
        assert_eq!(db.sales().count("t-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_request_shape_errors() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 100, 50, 10).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());
        let ctx = seller("t-1");

        let empty = service.create_sale(&ctx, request(vec![])).await.unwrap_err();
        assert!(matches!(empty, SaleError::Validation(ValidationError::Required { .. })));

        let zero = service
            .create_sale(&ctx, request(vec![CartLine::new(&p.id, 0)]))
            .await
            .unwrap_err();
        assert!(matches!(zero, SaleError::Validation(_)));

        let bogus = service
            .create_sale(
                &ctx,
                CreateSaleRequest {
                    customer_id: None,
                    lines: vec![CartLine::new(&p.id, 1)],
                    discount: Some(DiscountInstruction {
                        discount_type: "BOGO".to_string(),
                        value: 1,
                    }),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            bogus,
            SaleError::Validation(ValidationError::NotAllowed { .. })
        ));

        let too_much = service
            .create_sale(
                &ctx,
                CreateSaleRequest {
                    customer_id: None,
                    lines: vec![CartLine::new(&p.id, 1)],
                    discount: Some(DiscountInstruction::percentage(150)),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            too_much,
            SaleError::Validation(ValidationError::OutOfRange {
                field: "discount.value".to_string(),
                min: 0,
                max: 100,
            })
        );
    }

    #[tokio::test]
    async fn test_other_tenants_data_is_not_found() {
        let db = memory_db().await;
        let mine = seed_product(&db, "t-1", "Mine", 100, 50, 10).await;
        let theirs = seed_product(&db, "t-2", "Theirs", 100, 50, 10).await;
        let customer = Customer {
            id: tally_db::repository::generate_id(),
            tenant_id: "t-2".to_string(),
            name: "Someone else's".to_string(),
            phone: None,
            created_at: Utc::now(),
        };
        db.customers().insert(&customer).await.unwrap();
        let service = SaleService::new(db.clone(), EngineConfig::default());
        let ctx = seller("t-1");

        let err = service
            .create_sale(&ctx, request(vec![CartLine::new(&theirs.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err, SaleError::product_not_found(theirs.id.as_str()));

        let err = service
            .create_sale(
                &ctx,
                CreateSaleRequest {
                    customer_id: Some(customer.id.clone()),
                    lines: vec![CartLine::new(&mine.id, 1)],
                    discount: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err, SaleError::customer_not_found(customer.id.as_str()));

        assert_eq!(stock_of(&db, "t-2", &theirs.id).await, 10);
    }

    #[tokio::test]
    async fn test_inactive_product_and_bad_prices() {
        let db = memory_db().await;
        let off = seed_product(&db, "t-1", "Off", 100, 50, 10).await;
        db.products().set_active("t-1", &off.id, false).await.unwrap();
        let free = seed_product(&db, "t-1", "Free", 0, 0, 10).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());
        let ctx = seller("t-1");

        let err = service
            .create_sale(&ctx, request(vec![CartLine::new(&off.id, 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::NotFound);

        let err = service
            .create_sale(&ctx, request(vec![CartLine::new(&free.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, SaleError::DataIntegrity { .. }));
        assert_eq!(stock_of(&db, "t-1", &free.id).await, 10);
    }

    #[tokio::test]
    async fn test_precheck_insufficient_stock_names_product() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Sugar 1kg", 100, 50, 3).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());

        let err = service
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 5)]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            SaleError::InsufficientStock {
                product: "Sugar 1kg".to_string(),
                available: 3,
                requested: 5,
            }
        );
        assert!(err.to_string().contains("Sugar 1kg"));
        assert!(err.to_string().contains('3'));
    }

    #[tokio::test]
    async fn test_later_price_change_leaves_sale_untouched() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 5000, 4000, 5).await;
        let service = SaleService::new(db.clone(), EngineConfig::default());

        let result = service
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 1)]))
            .await
            .unwrap();

        db.products().update_prices("t-1", &p.id, 9900, 8000).await.unwrap();

        let stored = db
            .sales()
            .get_with_items("t-1", &result.sale.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sale.total_cents, 5000);
        assert_eq!(stored.items[0].selling_price_cents, 5000);
        assert_eq!(stored.items[0].purchase_price_cents, 4000);
    }

    // -------------------------------------------------------------------------
    // Store wrappers for the failure paths
    // -------------------------------------------------------------------------

    /// Counts ERROR-level events seen while installed as the default
    /// subscriber.
    #[derive(Clone, Default)]
    struct ErrorEvents(Arc<AtomicU32>);

    impl ErrorEvents {
        fn count(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for ErrorEvents {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Delegates to a [`Database`], optionally lying about the last sale
    /// number, letting stock drop between the pre-check and the unit of
    /// work, or stalling inside the unit of work.
    struct ScriptedStore {
        inner: Database,
        stale_lookups: AtomicU32,
        drain_before_write: Option<(String, i64)>,
        work_delay: Option<Duration>,
    }

    impl ScriptedStore {
        fn new(inner: Database) -> Self {
            ScriptedStore {
                inner,
                stale_lookups: AtomicU32::new(0),
                drain_before_write: None,
                work_delay: None,
            }
        }
    }

    struct ScriptedWork {
        inner: SqliteUnitOfWork,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl InventoryStore for ScriptedStore {
        type Work = ScriptedWork;

        async fn find_products(&self, tenant_id: &str, ids: &[String]) -> StoreResult<Vec<Product>> {
            self.inner.find_products(tenant_id, ids).await
        }

        async fn find_product(&self, tenant_id: &str, id: &str) -> StoreResult<Option<Product>> {
            self.inner.find_product(tenant_id, id).await
        }

        async fn customer_belongs_to(&self, tenant_id: &str, id: &str) -> StoreResult<bool> {
            self.inner.customer_belongs_to(tenant_id, id).await
        }

        async fn last_sale_number(
            &self,
            tenant_id: &str,
            day_prefix: &str,
        ) -> StoreResult<Option<String>> {
            let stale = self
                .stale_lookups
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if stale {
                return Ok(None);
            }
            self.inner.last_sale_number(tenant_id, day_prefix).await
        }

        async fn ledger_balance(&self, tenant_id: &str, product_id: &str) -> StoreResult<i64> {
            self.inner.ledger_balance(tenant_id, product_id).await
        }

        async fn stock_history(
            &self,
            tenant_id: &str,
            product_id: &str,
            limit: u32,
        ) -> StoreResult<Vec<StockTransaction>> {
            self.inner.stock_history(tenant_id, product_id, limit).await
        }

        async fn begin(&self) -> StoreResult<ScriptedWork> {
            if let Some((product_id, delta)) = &self.drain_before_write {
                // A competing checkout commits between pre-check and write
                let mut other = self.inner.begin().await?;
                other.apply_stock_delta("t-1", product_id, *delta).await?;
                other.commit().await?;
            }
            Ok(ScriptedWork {
                inner: self.inner.begin().await?,
                delay: self.work_delay,
            })
        }
    }

    #[async_trait]
    impl UnitOfWork for ScriptedWork {
        async fn apply_stock_delta(
            &mut self,
            tenant_id: &str,
            product_id: &str,
            delta: i64,
        ) -> StoreResult<StockChange> {
            let change = self.inner.apply_stock_delta(tenant_id, product_id, delta).await?;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(change)
        }

        async fn insert_sale(&mut self, sale: &Sale, items: &[SaleItem]) -> StoreResult<()> {
            self.inner.insert_sale(sale, items).await
        }

        async fn append_stock_transaction(&mut self, entry: &StockTransaction) -> StoreResult<()> {
            self.inner.append_stock_transaction(entry).await
        }

        async fn commit(self) -> StoreResult<()> {
            self.inner.commit().await
        }

        async fn rollback(self) -> StoreResult<()> {
            self.inner.rollback().await
        }
    }

    #[tokio::test]
    async fn test_authoritative_recheck_rolls_back_everything() {
        let db = memory_db().await;
        let a = seed_product(&db, "t-1", "A", 100, 50, 5).await;
        let b = seed_product(&db, "t-1", "B", 100, 50, 5).await;

        // Pre-check sees 5 of B; by the time the unit of work runs only 1 is left
        let mut store = ScriptedStore::new(db.clone());
        store.drain_before_write = Some((b.id.clone(), -4));
        let service = SaleService::new(store, EngineConfig::default());

        let errors = ErrorEvents::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(errors.clone()),
        );

        let err = service
            .create_sale(
                &seller("t-1"),
                request(vec![CartLine::new(&a.id, 2), CartLine::new(&b.id, 3)]),
            )
            .await
            .unwrap_err();

        // Running out of stock is an expected outcome, not an ERROR
        assert_eq!(errors.count(), 0);

        assert_eq!(
            err,
            SaleError::InsufficientStock {
                product: "B".to_string(),
                available: 1,
                requested: 3,
            }
        );
        // A's decrement was rolled back with the rest
        assert_eq!(stock_of(&db, "t-1", &a.id).await, 5);
        assert_eq!(stock_of(&db, "t-1", &b.id).await, 1);
        assert_eq!(db.sales().count("t-1").await.unwrap(), 0);
        assert_eq!(db.ledger().history("t-1", &a.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sale_number_collision_is_retried() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 100, 50, 10).await;
        let direct = SaleService::new(db.clone(), EngineConfig::default());
        let first = direct
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 1)]))
            .await
            .unwrap();
        assert!(first.sale.sale_number.ends_with("-001"));

        // The first lookup misses the committed sale, so -001 is proposed again
        let store = ScriptedStore::new(db.clone());
        store.stale_lookups.store(1, Ordering::SeqCst);
        let service = SaleService::new(store, EngineConfig::default());

        let second = service
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 2)]))
            .await
            .unwrap();

        assert!(second.sale.sale_number.ends_with("-002"));
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 10 - 1 - 2);
        assert_eq!(db.sales().count("t-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_leave_no_trace() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 100, 50, 10).await;
        let direct = SaleService::new(db.clone(), EngineConfig::default());
        direct
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 1)]))
            .await
            .unwrap();

        let store = ScriptedStore::new(db.clone());
        store.stale_lookups.store(u32::MAX, Ordering::SeqCst);
        let config = EngineConfig::default().with_max_sequence_retries(2);
        let service = SaleService::new(store, config);

        let err = service
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 4)]))
            .await
            .unwrap_err();

        assert_eq!(err, SaleError::SequenceExhausted { attempts: 3 });
        assert!(!err.is_user_correctable());
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 9);
        assert_eq!(db.sales().count("t-1").await.unwrap(), 1);
        assert_eq!(db.ledger().balance("t-1", &p.id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_timeout_rolls_back() {
        let db = memory_db().await;
        let p = seed_product(&db, "t-1", "Tea", 100, 50, 10).await;

        let mut store = ScriptedStore::new(db.clone());
        store.work_delay = Some(Duration::from_millis(500));
        let config = EngineConfig::default().with_transaction_timeout(Duration::from_millis(50));
        let service = SaleService::new(store, config);

        let errors = ErrorEvents::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(errors.clone()),
        );

        let err = service
            .create_sale(&seller("t-1"), request(vec![CartLine::new(&p.id, 4)]))
            .await
            .unwrap_err();

        assert_eq!(err.code(), crate::ErrorCode::StorageError);
        assert_eq!(errors.count(), 1);
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 10);
        assert_eq!(db.sales().count("t-1").await.unwrap(), 0);
    }

    // -------------------------------------------------------------------------
    // Concurrency (file-backed database, several connections)
    // -------------------------------------------------------------------------

    async fn file_db(dir: &tempfile::TempDir) -> Database {
        let config = DbConfig::new(dir.path().join("tally.db"))
            .max_connections(8)
            .busy_timeout(Duration::from_secs(10));
        Database::new(config).await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_concurrent_sales_cannot_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let p = seed_product(&db, "t-1", "Flour", 100, 50, 5).await;
        let service = Arc::new(SaleService::new(db.clone(), EngineConfig::default()));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = Arc::clone(&service);
            let product_id = p.id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create_sale(&seller("t-1"), request(vec![CartLine::new(product_id, 3)]))
                    .await
            }));
        }

        let mut committed = 0;
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(SaleError::InsufficientStock { available, .. }) => {
                    assert_eq!(available, 2);
                    refused += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((committed, refused), (1, 1));
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 2);
        assert_eq!(db.ledger().balance("t-1", &p.id).await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_concurrent_sales_get_distinct_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let p = seed_product(&db, "t-1", "Soap", 100, 50, 5).await;
        let config = EngineConfig::default().with_max_sequence_retries(8);
        let service = Arc::new(SaleService::new(db.clone(), config));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let service = Arc::clone(&service);
            let product_id = p.id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .create_sale(&seller("t-1"), request(vec![CartLine::new(product_id, 1)]))
                    .await
            }));
        }

        let mut numbers = Vec::new();
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(result) => numbers.push(result.sale.sale_number),
                Err(SaleError::InsufficientStock { .. }) => refused += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(numbers.len(), 5);
        assert_eq!(refused, 5);
        let distinct: HashSet<&String> = numbers.iter().collect();
        assert_eq!(distinct.len(), 5);
        assert!(numbers.iter().all(|n| is_well_formed("INV", n)));
        assert_eq!(stock_of(&db, "t-1", &p.id).await, 0);
    }
}
