//! # Engine Error Type
//!
//! What callers of the engine see when an operation fails.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Engine                             │
//! │                                                                         │
//! │  ValidationError ──┐                                                    │
//! │  CoreError ────────┼──► SaleError ──► code() ──► ErrorCode (serde)      │
//! │  StoreError ───────┘         │                                          │
//! │   (sale-number collisions    └──► is_user_correctable()                │
//! │    are retried first and          true  → show the message, let the    │
//! │    only surface as                        cashier fix the cart         │
//! │    SequenceExhausted)             false → infrastructure; log and      │
//! │                                           apologise                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tally_core::{CoreError, StoreError, ValidationError};
use thiserror::Error;
use ts_rs::TS;

/// Errors returned by [`SaleService`](crate::SaleService) and
/// [`InventoryService`](crate::InventoryService).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SaleError {
    /// Malformed request; nothing was read or written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A product or customer does not exist for the tenant (or is inactive).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Not enough stock, at pre-check or at the authoritative re-check.
    #[error("Insufficient stock for {product}: only {available} available, {requested} requested")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Catalog data that cannot be priced (non-positive selling price,
    /// negative purchase price).
    #[error("Product {product_id} has invalid pricing data: {reason}")]
    DataIntegrity { product_id: String, reason: String },

    /// Every attempt collided with a concurrently committed sale number.
    /// Transient: the same request may succeed if resubmitted.
    #[error("Could not allocate a unique sale number after {attempts} attempts")]
    SequenceExhausted { attempts: u32 },

    /// Infrastructure failure. The unit of work was rolled back.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Machine-readable error codes.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'INSUFFICIENT_STOCK': highlightLine(e.message); break;
///   case 'SEQUENCE_EXHAUSTED': retryCheckout(); break;
///   default: showError(e.message);
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    InsufficientStock,
    DataIntegrity,
    SequenceExhausted,
    StorageError,
}

impl SaleError {
    /// Creates a not found error for a product.
    pub fn product_not_found(id: impl Into<String>) -> Self {
        SaleError::NotFound {
            entity: "Product".to_string(),
            id: id.into(),
        }
    }

    /// Creates a not found error for a customer.
    pub fn customer_not_found(id: impl Into<String>) -> Self {
        SaleError::NotFound {
            entity: "Customer".to_string(),
            id: id.into(),
        }
    }

    /// The machine-readable code of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SaleError::Validation(_) => ErrorCode::ValidationError,
            SaleError::NotFound { .. } => ErrorCode::NotFound,
            SaleError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
            SaleError::DataIntegrity { .. } => ErrorCode::DataIntegrity,
            SaleError::SequenceExhausted { .. } => ErrorCode::SequenceExhausted,
            SaleError::Storage(_) => ErrorCode::StorageError,
        }
    }

    /// True when the request itself (or the catalog) must change before it
    /// can succeed; false for infrastructure failures.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            SaleError::Validation(_)
                | SaleError::NotFound { .. }
                | SaleError::InsufficientStock { .. }
                | SaleError::DataIntegrity { .. }
        )
    }
}

impl From<CoreError> for SaleError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => SaleError::product_not_found(id),
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => SaleError::InsufficientStock {
                product,
                available,
                requested,
            },
            CoreError::DataIntegrity { product_id, reason } => {
                SaleError::DataIntegrity { product_id, reason }
            }
            CoreError::Validation(v) => SaleError::Validation(v),
        }
    }
}

impl From<StoreError> for SaleError {
    fn from(err: StoreError) -> Self {
        SaleError::Storage(err.to_string())
    }
}

/// Result type of engine operations.
pub type EngineResult<T> = Result<T, SaleError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::InsufficientStock).unwrap(),
            "\"INSUFFICIENT_STOCK\""
        );
        assert_eq!(
            serde_json::to_string(&ErrorCode::SequenceExhausted).unwrap(),
            "\"SEQUENCE_EXHAUSTED\""
        );
    }

    #[test]
    fn test_user_correctable_split() {
        let stock = SaleError::InsufficientStock {
            product: "Sugar 1kg".to_string(),
            available: 3,
            requested: 5,
        };
        assert!(stock.is_user_correctable());
        assert_eq!(stock.code(), ErrorCode::InsufficientStock);
        assert_eq!(
            stock.to_string(),
            "Insufficient stock for Sugar 1kg: only 3 available, 5 requested"
        );

        assert!(!SaleError::SequenceExhausted { attempts: 3 }.is_user_correctable());
        assert!(!SaleError::Storage("disk I/O error".to_string()).is_user_correctable());
    }

    #[test]
    fn test_core_errors_convert() {
        let err: SaleError = CoreError::ProductNotFound("p-9".to_string()).into();
        assert_eq!(err, SaleError::product_not_found("p-9"));
        assert_eq!(err.to_string(), "Product not found: p-9");

        let err: SaleError = CoreError::Validation(ValidationError::Required {
            field: "lines".to_string(),
        })
        .into();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[test]
    fn test_store_errors_are_opaque_storage_failures() {
        let err: SaleError = StoreError::Backend("disk full".to_string()).into();
        assert_eq!(err.code(), ErrorCode::StorageError);
    }
}
