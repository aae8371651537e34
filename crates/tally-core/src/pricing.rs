//! # Pricing Calculator
//!
//! Turns a cart plus an optional discount into the figures stored on a sale.
//!
//! ## Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each line:                                                         │
//! │    line_subtotal = selling_price × qty                                  │
//! │    line_profit   = (selling_price − purchase_price) × qty               │
//! │                                                                         │
//! │  subtotal = Σ line_subtotal                                             │
//! │  discount = min(PERCENTAGE: subtotal × value / 100 | FLAT: value,       │
//! │                 subtotal)                                               │
//! │  total    = subtotal − discount            (never negative)             │
//! │  profit   = Σ line_profit                  (NOT reduced by discount)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount is a revenue concession, so reported profit ignores it. This
//! matches how sale profit has always been reported to sellers and must not
//! change without a product decision.
//!
//! Every multiplication and sum is checked; a cart whose figures do not fit
//! in an `i64` of minor units is reported as `DataIntegrity`.
//!
//! The calculator is a pure function of its inputs. Products are looked up
//! in the slice it is given, which the caller has already scoped to a tenant.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{CartLine, Discount, Product};

/// One priced line, carrying the price snapshot that ends up on the sale item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub selling_price: Money,
    pub purchase_price: Money,
    pub subtotal: Money,
    pub profit: Money,
}

/// Result of pricing a whole cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedCart {
    pub lines: Vec<PricedLine>,
    #[serde(skip)]
    pub discount: Option<Discount>,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub total: Money,
    pub profit: Money,
}

/// Checks that a product can be priced at all.
///
/// A product failing this is corrupt catalog data; it is reported, never
/// skipped.
pub fn check_price_integrity(product: &Product) -> CoreResult<()> {
    if product.selling_price_cents <= 0 {
        return Err(CoreError::DataIntegrity {
            product_id: product.id.clone(),
            reason: format!("selling price {} is not positive", product.selling_price()),
        });
    }
    if product.purchase_price_cents < 0 {
        return Err(CoreError::DataIntegrity {
            product_id: product.id.clone(),
            reason: format!("purchase price {} is negative", product.purchase_price()),
        });
    }
    Ok(())
}

/// Prices a cart against a snapshot of the tenant's products.
///
/// ## Preconditions checked (fail fast, first failing line wins)
/// 1. Every line resolves to an active product → `ProductNotFound`
/// 2. Price fields are sane → `DataIntegrity`
/// 3. `quantity ≤ current_stock` at snapshot time → `InsufficientStock`
///
/// The stock check here is advisory; the unit of work re-checks against the
/// live row.
///
/// ## Example
/// ```rust
/// # use chrono::Utc;
/// use tally_core::pricing::price_cart;
/// use tally_core::types::{CartLine, Discount, Product};
///
/// let now = Utc::now();
/// let product = Product {
///     id: "p".into(), tenant_id: "t".into(), name: "Tea".into(),
///     category_id: None, unit: None,
///     purchase_price_cents: 4000, selling_price_cents: 5000,
///     current_stock: 5, min_stock_level: 0, is_active: true,
///     created_at: now, updated_at: now,
/// };
/// let priced = price_cart(
///     &[product],
///     &[CartLine::new("p", 2)],
///     Some(Discount::Percentage { percent: 10 }),
/// ).unwrap();
/// assert_eq!(priced.total.cents(), 9000);
/// assert_eq!(priced.profit.cents(), 2000);
/// ```
pub fn price_cart(
    products: &[Product],
    lines: &[CartLine],
    discount: Option<Discount>,
) -> CoreResult<PricedCart> {
    let by_id: HashMap<&str, &Product> = products.iter().map(|p| (p.id.as_str(), p)).collect();

    let mut priced = Vec::with_capacity(lines.len());
    for line in lines {
        let product = by_id
            .get(line.product_id.as_str())
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        check_price_integrity(product)?;

        if line.quantity > product.current_stock {
            return Err(CoreError::InsufficientStock {
                product: product.name.clone(),
                available: product.current_stock,
                requested: line.quantity,
            });
        }

        let selling_price = product.selling_price();
        let purchase_price = product.purchase_price();
        let subtotal = selling_price
            .checked_mul(line.quantity)
            .ok_or_else(|| overflow(&product.id, "line subtotal"))?;
        let profit = selling_price
            .checked_sub(purchase_price)
            .and_then(|margin| margin.checked_mul(line.quantity))
            .ok_or_else(|| overflow(&product.id, "line profit"))?;

        priced.push(PricedLine {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            quantity: line.quantity,
            selling_price,
            purchase_price,
            subtotal,
            profit,
        });
    }

    let mut subtotal = Money::zero();
    let mut profit = Money::zero();
    for line in &priced {
        subtotal = subtotal
            .checked_add(line.subtotal)
            .ok_or_else(|| overflow(&line.product_id, "cart subtotal"))?;
        profit = profit
            .checked_add(line.profit)
            .ok_or_else(|| overflow(&line.product_id, "cart profit"))?;
    }
    let discount_amount = discount
        .map(|d| d.amount_for(subtotal))
        .unwrap_or_default();

    Ok(PricedCart {
        lines: priced,
        discount,
        subtotal,
        discount_amount,
        total: subtotal - discount_amount,
        profit,
    })
}

fn overflow(product_id: &str, figure: &str) -> CoreError {
    CoreError::DataIntegrity {
        product_id: product_id.to_string(),
        reason: format!("{figure} overflows"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
