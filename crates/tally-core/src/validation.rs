//! # Validation Module
//!
//! Shape checks on a `CreateSaleRequest`, run before anything touches storage.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request shape (THIS MODULE)                                  │
//! │  ├── non-empty cart, sane line count                                   │
//! │  ├── product ids present, quantities positive                          │
//! │  ├── no duplicate product ids                                          │
//! │  └── discount type known, value in range                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Catalog snapshot (pricing module)                            │
//! │  ├── products exist, active, priced sanely                             │
//! │  └── advisory stock check                                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Unit of work (storage)                                       │
//! │  ├── guarded stock decrement (authoritative)                           │
//! │  └── UNIQUE (tenant_id, sale_number)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::types::{CartLine, Discount, DiscountInstruction, DiscountType};
use crate::money::Money;
use crate::{MAX_CART_ITEMS, MAX_DISCOUNT_PERCENT, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Cart Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates the lines of a cart.
///
/// ## Rules
/// - At least one line, at most MAX_CART_ITEMS
/// - Every product id non-blank
/// - Every quantity valid (see [`validate_quantity`])
/// - Each product id appears once; duplicates are rejected, never merged
pub fn validate_cart_lines(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }

    if lines.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "productId".to_string(),
            });
        }

        validate_quantity(line.quantity)?;

        if !seen.insert(line.product_id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "productId".to_string(),
                value: line.product_id.clone(),
            });
        }
    }

    Ok(())
}

// =============================================================================
// Discount Validators
// =============================================================================

/// Parses a raw discount instruction.
///
/// ## Rules
/// - Type is PERCENTAGE or FLAT (case-insensitive)
/// - Value ≥ 0
/// - PERCENTAGE value ≤ 100 (whole percent)
///
/// ## Example
/// ```rust
/// use tally_core::types::{Discount, DiscountInstruction};
/// use tally_core::validation::parse_discount;
///
/// let d = parse_discount(&DiscountInstruction::percentage(10)).unwrap();
/// assert_eq!(d, Discount::Percentage { percent: 10 });
/// ```
pub fn parse_discount(instruction: &DiscountInstruction) -> ValidationResult<Discount> {
    let kind = match instruction.discount_type.trim().to_ascii_uppercase().as_str() {
        "PERCENTAGE" => DiscountType::Percentage,
        "FLAT" => DiscountType::Flat,
        _ => {
            return Err(ValidationError::NotAllowed {
                field: "discount.type".to_string(),
                allowed: DiscountType::ALL
                    .iter()
                    .map(|t| t.as_str().to_string())
                    .collect(),
            })
        }
    };

    match kind {
        DiscountType::Percentage => {
            if !(0..=MAX_DISCOUNT_PERCENT).contains(&instruction.value) {
                return Err(ValidationError::OutOfRange {
                    field: "discount.value".to_string(),
                    min: 0,
                    max: MAX_DISCOUNT_PERCENT,
                });
            }
            Ok(Discount::Percentage {
                percent: instruction.value,
            })
        }
        DiscountType::Flat => {
            if instruction.value < 0 {
                return Err(ValidationError::OutOfRange {
                    field: "discount.value".to_string(),
                    min: 0,
                    max: i64::MAX,
                });
            }
            Ok(Discount::Flat {
                amount: Money::from_cents(instruction.value),
            })
        }
    }
}

/// Parses an optional discount; `None` stays `None`.
pub fn parse_optional_discount(
    instruction: Option<&DiscountInstruction>,
) -> ValidationResult<Option<Discount>> {
    instruction.map(parse_discount).transpose()
}

// =============================================================================
// Unit Tests
// =============================================================================
