//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── ValidationError  - Malformed cart / discount input                │
//! │  ├── CoreError        - Pricing & business rule failures              │
//! │  └── StoreError       - Storage-agnostic adapter failures              │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - sqlx failures, converted into StoreError       │
//! │                                                                         │
//! │  tally-engine errors                                                   │
//! │  └── SaleError        - What the caller sees                           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError ┐                                   │
//! │        DbError → StoreError ───────┴──► SaleError → caller             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, id, quantities)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule failures raised by the pricing calculator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Product does not resolve to an active product of the tenant.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Sugar 1kg", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 Sugar 1kg in stock"
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Catalog data that can never be sold correctly.
    ///
    /// ## When This Occurs
    /// - selling price is zero or negative
    /// - purchase price is negative
    ///
    /// This is upstream catalog corruption, not a cashier mistake.
    #[error("Product {product_id} has invalid pricing data: {reason}")]
    DataIntegrity { product_id: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These are reported to the caller verbatim and never reach storage.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero (signed stock adjustments).
    #[error("{field} must not be zero")]
    MustBeNonZero { field: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., the same product twice in one cart).
    #[error("{field} '{value}' appears more than once")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Store Error
// =============================================================================

/// Failures reported by a storage adapter.
///
/// Adapters map their native errors onto these variants so the orchestrator
/// can tell a retryable sale-number collision apart from everything else.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A referenced row does not exist.
    #[error("Referenced row missing: {0}")]
    MissingReference(String),

    /// The backend could not complete the operation.
    #[error("Storage backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// True when the violated constraint is the per-tenant sale number index.
    pub fn is_sale_number_collision(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint.contains("sale_number"))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// Convenience type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
