//! # Repository Module
//!
//! Database repositories for the sale engine.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Who Writes What                                      │
//! │                                                                         │
//! │  Catalog management / reporting                                        │
//! │       │  db.products().low_stock("tenant-1")                           │
//! │       ▼                                                                 │
//! │  ProductRepository  CustomerRepository  SaleRepository  LedgerRepo     │
//! │  ├── insert (+ opening ledger row)      ├── get_by_number              │
//! │  ├── update_prices / set_active         ├── get_with_items             │
//! │  └── low_stock                          └── list_between               │
//! │                                                                         │
//! │  Sales and stock movements are NEVER written here directly.            │
//! │  They go through a unit of work (store.rs), which reuses the           │
//! │  crate-private insert helpers of `sale` and `ledger` on its            │
//! │  transaction.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method takes the tenant explicitly. A row of another tenant is
//! indistinguishable from a missing row.
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads and maintenance
//! - [`customer::CustomerRepository`] - Customer records
//! - [`sale::SaleRepository`] - Sale and sale item reads
//! - [`ledger::LedgerRepository`] - Stock ledger reads

pub mod customer;
pub mod ledger;
pub mod product;
pub mod sale;

/// Generates a new entity ID (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
