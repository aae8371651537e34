//! # tally-engine: Sale Orchestration for the Tally sale engine
//!
//! The write side of a sale: validation, pricing, sale number allocation,
//! and the unit of work that decrements stock, records the sale, and appends
//! the ledger, all or nothing.
//!
//! ## create_sale at a Glance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CreateSaleRequest + TenantContext                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Validating ──► Pricing ──► NumberAllocated ──► InTransaction ──┐      │
//! │     │              │              ▲                  │          │      │
//! │     ▼              ▼              │ sale number      ▼          ▼      │
//! │  Rejected       Rejected          └── collision ── Aborted   Committed │
//! │  (no I/O        (snapshot             (bounded     (rolled   (Sale +   │
//! │   writes)        stock/price)          retry)       back)     items)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`sale`] - `SaleService::create_sale`
//! - [`inventory`] - Manual stock movements, ledger history, reconciliation
//! - [`sequencer`] - Sale number allocation for a tenant and day
//! - [`config`] - Engine configuration (`TALLY_*` environment variables)
//! - [`error`] - Caller-facing error taxonomy
//! - [`telemetry`] - Tracing subscriber setup
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::{CartLine, CreateSaleRequest, Role, TenantContext};
//! use tally_db::{Database, DbConfig};
//! use tally_engine::{EngineConfig, SaleService};
//!
//! tally_engine::telemetry::init_tracing();
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//! let sales = SaleService::new(db, EngineConfig::from_env()?);
//!
//! let ctx = TenantContext::new("shop-1", "seller-1", Role::Seller);
//! let receipt = sales
//!     .create_sale(&ctx, CreateSaleRequest {
//!         lines: vec![CartLine::new(product_id, 2)],
//!         ..Default::default()
//!     })
//!     .await?;
//! println!("{}", receipt.sale.sale_number);
//! ```

pub mod config;
pub mod error;
pub mod inventory;
pub mod sale;
pub mod sequencer;
pub mod telemetry;

pub use config::{ConfigError, EngineConfig};
pub use error::{EngineResult, ErrorCode, SaleError};
pub use inventory::{InventoryService, Reconciliation, StockMovement};
pub use sale::{SaleService, SaleStage};
pub use sequencer::InvoiceSequencer;

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;
    use tally_core::{Product, Role, TenantContext};
    use tally_db::{Database, DbConfig};

    pub async fn memory_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub fn seller(tenant_id: &str) -> TenantContext {
        TenantContext::new(tenant_id, format!("{tenant_id}-seller"), Role::Seller)
    }

    pub async fn seed_product(
        db: &Database,
        tenant_id: &str,
        name: &str,
        selling: i64,
        purchase: i64,
        stock: i64,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: tally_db::repository::generate_id(),
            tenant_id: tenant_id.to_string(),
            name: name.to_string(),
            category_id: None,
            unit: None,
            purchase_price_cents: purchase,
            selling_price_cents: selling,
            current_stock: stock,
            min_stock_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product, "setup").await.unwrap()
    }
}
