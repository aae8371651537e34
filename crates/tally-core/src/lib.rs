//! # tally-core: Pure Business Logic for the Tally sale engine
//!
//! This crate holds everything about a sale that can be decided without
//! touching storage: money arithmetic, cart validation, pricing, and the
//! sale number format. It also defines the storage contract
//! ([`store::InventoryStore`] / [`store::UnitOfWork`]) that adapters implement.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Request handlers (billing UI, API, ...)               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ CreateSaleRequest + TenantContext      │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        tally-engine (SaleService, InventoryService)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │  types  │ │  money  │ │ pricing  │ │ invoice │ │ store  │  │   │
//! │  │   │ Product │ │  Money  │ │price_cart│ │ INV-... │ │ traits │  │   │
//! │  │   │  Sale   │ │         │ │          │ │         │ │        │  │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                ▲                                        │
//! │  ┌─────────────────────────────┴───────────────────────────────────┐   │
//! │  │             tally-db (implements the store traits)              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, SaleItem, StockTransaction, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Cart and discount validation
//! - [`pricing`] - The pricing calculator
//! - [`invoice`] - Sale number formatting and parsing
//! - [`store`] - Storage traits implemented by adapters
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let price = Money::from_cents(5000);
//! let line = price.checked_mul(2).unwrap();
//! assert_eq!(line.percentage(1000).cents(), 1000); // 10% of 100.00
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod invoice;
pub mod money;
pub mod pricing;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, StoreError, StoreResult, ValidationError};
pub use money::Money;
pub use pricing::{price_cart, PricedCart, PricedLine};
pub use store::{InventoryStore, StockChange, UnitOfWork};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct lines allowed in a single cart.
///
/// ## Business Reason
/// Prevents runaway carts and keeps one unit of work reasonably small.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Basis points representing 100%.
pub const FULL_PERCENTAGE_BPS: i64 = 10_000;

/// Largest PERCENTAGE discount a request may carry, in percent.
pub const MAX_DISCOUNT_PERCENT: i64 = 100;

/// Default prefix of generated sale numbers (`INV-YYYYMMDD-NNN`).
pub const DEFAULT_INVOICE_PREFIX: &str = "INV";
