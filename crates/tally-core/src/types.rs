//! # Domain Types
//!
//! Core domain types used throughout the sale engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │    Product      │   │      Sale       │   │  StockTransaction    │  │
//! │  │  ─────────────  │   │  ─────────────  │   │  ──────────────────  │  │
//! │  │  id, tenant_id  │   │  sale_number    │   │  product_id          │  │
//! │  │  selling_price  │   │  subtotal       │   │  quantity (signed)   │  │
//! │  │  purchase_price │   │  discount       │   │  SALE | PURCHASE |   │  │
//! │  │  current_stock  │   │  total, profit  │   │  ADJUSTMENT          │  │
//! │  └────────┬────────┘   └────────┬────────┘   └──────────────────────┘  │
//! │           │ referenced by       │ owns 1:N                              │
//! │           ▼                     ▼                                       │
//! │  ┌──────────────────────────────────────────┐                          │
//! │  │ SaleItem (price snapshot at time of sale)│                          │
//! │  └──────────────────────────────────────────┘                          │
//! │                                                                         │
//! │  Inputs: TenantContext, CreateSaleRequest { CartLine*, Discount? }     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every persisted entity carries `tenant_id`; queries take the tenant as an
//! explicit parameter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::{FULL_PERCENTAGE_BPS, MAX_DISCOUNT_PERCENT};

// =============================================================================
// Tenant Context
// =============================================================================

/// Role of the requester, as asserted by the surrounding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Platform administrator acting on behalf of a seller.
    Admin,
    /// The seller (shop account) itself.
    Seller,
}

/// Who is asking, and for which shop.
///
/// Supplied by the session layer and trusted as-is, except that a sale's
/// customer is re-checked against `tenant_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TenantContext {
    pub tenant_id: String,
    pub requester_id: String,
    pub role: Role,
}

impl TenantContext {
    pub fn new(tenant_id: impl Into<String>, requester_id: impl Into<String>, role: Role) -> Self {
        TenantContext {
            tenant_id: tenant_id.into(),
            requester_id: requester_id.into(),
            role,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in a tenant's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Tenant this product belongs to.
    pub tenant_id: String,

    /// Display name, copied onto sale items.
    pub name: String,

    /// Optional category reference (categories are managed elsewhere).
    pub category_id: Option<String>,

    /// Unit of measure ("kg", "pcs", ...).
    pub unit: Option<String>,

    /// Cost in minor units (≥ 0).
    pub purchase_price_cents: i64,

    /// Price charged in minor units (> 0 to be sellable).
    pub selling_price_cents: i64,

    /// Units on hand. Never negative.
    pub current_stock: i64,

    /// Alerting threshold only; never enforced by the engine.
    pub min_stock_level: i64,

    /// Inactive products are not sellable (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    #[inline]
    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// At or below the alerting threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.min_stock_level
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A tenant's customer. Only ownership is checked by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub phone: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount
// =============================================================================

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    /// Value is a whole percent of the subtotal (10 = 10%).
    Percentage,
    /// Value is an absolute amount in minor units.
    Flat,
}

impl DiscountType {
    pub const ALL: [DiscountType; 2] = [DiscountType::Percentage, DiscountType::Flat];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::Flat => "FLAT",
        }
    }
}

/// A validated discount.
///
/// Built from a [`DiscountInstruction`] by
/// [`validation::parse_discount`](crate::validation::parse_discount).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Whole percent of the subtotal, 0..=100.
    Percentage { percent: i64 },
    /// Absolute amount, ≥ 0.
    Flat { amount: Money },
}

impl Discount {
    pub fn discount_type(&self) -> DiscountType {
        match self {
            Discount::Percentage { .. } => DiscountType::Percentage,
            Discount::Flat { .. } => DiscountType::Flat,
        }
    }

    /// The value as persisted on the sale (percent or minor units).
    pub fn raw_value(&self) -> i64 {
        match self {
            Discount::Percentage { percent } => *percent,
            Discount::Flat { amount } => amount.cents(),
        }
    }

    /// Discount amount for a subtotal, clamped so it never exceeds the bill.
    pub fn amount_for(&self, subtotal: Money) -> Money {
        let computed = match self {
            Discount::Percentage { percent } => {
                subtotal.percentage(percent * (FULL_PERCENTAGE_BPS / MAX_DISCOUNT_PERCENT))
            }
            Discount::Flat { amount } => *amount,
        };
        computed.min(subtotal)
    }
}

// =============================================================================
// Requests
// =============================================================================

/// One (product, quantity) pair submitted for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// Raw discount as submitted by the caller.
///
/// `discount_type` is kept as text so an unknown type is reported as a
/// validation error instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct DiscountInstruction {
    #[serde(rename = "type")]
    pub discount_type: String,
    pub value: i64,
}

impl DiscountInstruction {
    pub fn percentage(percent: i64) -> Self {
        DiscountInstruction {
            discount_type: DiscountType::Percentage.as_str().to_string(),
            value: percent,
        }
    }

    pub fn flat(cents: i64) -> Self {
        DiscountInstruction {
            discount_type: DiscountType::Flat.as_str().to_string(),
            value: cents,
        }
    }
}

/// Input of `CreateSale`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    pub lines: Vec<CartLine>,
    #[serde(default)]
    pub discount: Option<DiscountInstruction>,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    /// `INV-YYYYMMDD-NNN`, unique per tenant.
    pub sale_number: String,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_type: Option<DiscountType>,
    /// Basis points for PERCENTAGE, minor units for FLAT.
    pub discount_value: Option<i64>,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Σ line profit; not reduced by the discount.
    pub profit_cents: i64,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line of a sale.
/// Uses snapshot pattern to freeze product prices at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    pub quantity: i64,
    /// Cost at time of sale (frozen).
    pub purchase_price_cents: i64,
    /// Price at time of sale (frozen).
    pub selling_price_cents: i64,
    /// selling_price × quantity
    pub subtotal_cents: i64,
    /// (selling_price − purchase_price) × quantity
    pub profit_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A sale together with its items, as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// Kind of stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Stock leaving through a sale (negative delta).
    Sale,
    /// Restock from a supplier (positive delta).
    Purchase,
    /// Manual correction, opening stock, shrinkage.
    Adjustment,
}

/// One append-only ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransaction {
    pub id: String,
    pub tenant_id: String,
    pub product_id: String,
    /// Signed delta applied to `Product::current_stock`.
    pub quantity: i64,
    pub transaction_type: TransactionType,
    pub note: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, min: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            tenant_id: "t-1".to_string(),
            name: "Rice 5kg".to_string(),
            category_id: None,
            unit: Some("bag".to_string()),
            purchase_price_cents: 4000,
            selling_price_cents: 5000,
            current_stock: stock,
            min_stock_level: min,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_product_money_accessors() {
        let p = product(5, 2);
        assert_eq!(p.selling_price().cents(), 5000);
        assert_eq!(p.purchase_price().cents(), 4000);
    }

    #[test]
    fn test_low_stock_threshold_is_inclusive() {
        assert!(product(2, 2).is_low_stock());
        assert!(!product(3, 2).is_low_stock());
    }

    #[test]
    fn test_discount_amount_is_clamped_to_subtotal() {
        let subtotal = Money::from_cents(10000);
        let flat = Discount::Flat {
            amount: Money::from_cents(15000),
        };
        assert_eq!(flat.amount_for(subtotal), subtotal);

        let pct = Discount::Percentage { percent: 10 };
        assert_eq!(pct.amount_for(subtotal).cents(), 1000);
        assert_eq!(pct.raw_value(), 10);
        assert_eq!(pct.discount_type(), DiscountType::Percentage);
    }

    #[test]
    fn test_create_sale_request_from_json() {
        let json = r#"{
            "customerId": "c-1",
            "lines": [{ "productId": "p-1", "quantity": 2 }],
            "discount": { "type": "PERCENTAGE", "value": 10 }
        }"#;
        let req: CreateSaleRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.customer_id.as_deref(), Some("c-1"));
        assert_eq!(req.lines, vec![CartLine::new("p-1", 2)]);
        assert_eq!(req.discount, Some(DiscountInstruction::percentage(10)));
    }

    #[test]
    fn test_create_sale_request_optional_fields() {
        let req: CreateSaleRequest =
            serde_json::from_str(r#"{ "lines": [] }"#).unwrap();
        assert!(req.customer_id.is_none());
        assert!(req.discount.is_none());
    }

    #[test]
    fn test_transaction_type_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&TransactionType::Adjustment).unwrap(),
            "\"ADJUSTMENT\""
        );
    }
}
