//! # tally-db: SQLite Storage for the Tally sale engine
//!
//! This crate persists the catalog, sales, and the stock ledger in SQLite
//! with sqlx, and implements the [`tally_core::InventoryStore`] contract the
//! engine writes through.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Data Flow                                  │
//! │                                                                         │
//! │  SaleService::create_sale / InventoryService (tally-engine)            │
//! │       │                                                                 │
//! │       ▼  InventoryStore + UnitOfWork                                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ ProductRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ CustomerRepo  │    │ 001_initial_ │  │   │
//! │  │   │ busy_timeout  │    │ SaleRepo      │    │   schema.sql │  │   │
//! │  │   │               │    │ LedgerRepo    │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼─────────────────────────────┐                       │   │
//! │  │   │ store.rs: SqliteUnitOfWork          │                       │   │
//! │  │   │ (one sqlx::Transaction per sale)    │                       │   │
//! │  │   └─────────────────────────────────────┘                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories (product, customer, sale, ledger)
//! - [`store`] - `InventoryStore` / `UnitOfWork` implementation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//!
//! let low = db.products().low_stock("tenant-1").await?;
//! let sale = db.sales().get_by_number("tenant-1", "INV-20261016-001").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use store::SqliteUnitOfWork;

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::SaleRepository;
