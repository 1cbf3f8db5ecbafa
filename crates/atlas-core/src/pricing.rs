//! # Pricing & Discount Calculator
//!
//! Pure functions turning line items with stacked discounts and active tax
//! rates into subtotal, discount total, tax amount, and grand total.
//!
//! ## Calculation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per line:                                                              │
//! │    line_subtotal = unit_price × quantity                                │
//! │    line_discount = line_subtotal × (Σ percent bps) + Σ fixed amounts    │
//! │    line_total    = max(0, line_subtotal − line_discount)                │
//! │                                                                         │
//! │  Per order:                                                             │
//! │    subtotal    = Σ line_subtotal                                        │
//! │    discount    = Σ line_discount                                        │
//! │    tax         = (subtotal − discount) × (Σ active tax bps)             │
//! │    grand_total = (subtotal − discount) + tax                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Percentage and fixed discounts are additive and unordered: percents are
//! summed in basis points and applied once to the line subtotal, then fixed
//! amounts are added. Discounts are NEVER applied sequentially to a shrinking
//! base. This is a deliberate, auditable policy.
//!
//! No side effects, no errors: negative quantities or prices are a caller
//! contract violation, not a runtime failure here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{ActiveTax, Discount, DiscountValue, LineItem};

// =============================================================================
// Totals Types
// =============================================================================

/// Priced breakdown of a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineTotals {
    /// Unit price × quantity, before discounts.
    pub subtotal: Money,

    /// Combined discount, capped at the line subtotal so the line never
    /// prices below zero.
    pub discount: Money,

    /// `subtotal − discount`, floored at zero.
    pub total: Money,
}

/// Priced breakdown of a whole order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub grand_total: Money,
}

impl Default for LineTotals {
    fn default() -> Self {
        LineTotals {
            subtotal: Money::zero(),
            discount: Money::zero(),
            total: Money::zero(),
        }
    }
}

// =============================================================================
// Discount Resolution
// =============================================================================

/// Resolves a line's discount ids to their values against a catalog.
///
/// Unknown ids are skipped: the catalog is the source of truth and a stale id
/// on a line must not poison pricing.
pub fn resolve_discount_values(
    item: &LineItem,
    catalog: &HashMap<String, Discount>,
) -> Vec<DiscountValue> {
    item.discount_ids
        .iter()
        .filter_map(|id| catalog.get(id).map(|d| d.value))
        .collect()
}

// =============================================================================
// Line Pricing
// =============================================================================

/// Prices one line from its unit price, quantity, and resolved discounts.
///
/// ## Example
/// ```rust
/// use atlas_core::money::Money;
/// use atlas_core::pricing::price_line_values;
/// use atlas_core::types::DiscountValue;
///
/// // unit ¤100.00 × 3, one 10% discount and one fixed ¤5.00 discount
/// let totals = price_line_values(
///     Money::from_cents(10000),
///     3,
///     &[DiscountValue::Percent(1000), DiscountValue::Fixed(Money::from_cents(500))],
/// );
/// assert_eq!(totals.subtotal.cents(), 30000);
/// assert_eq!(totals.discount.cents(), 3500);
/// assert_eq!(totals.total.cents(), 26500);
/// ```
pub fn price_line_values(unit_price: Money, quantity: i64, values: &[DiscountValue]) -> LineTotals {
    let subtotal = unit_price.multiply_quantity(quantity);

    // Additive stacking: sum percents in bps, apply once, then add fixed.
    let percent_bps: u32 = values
        .iter()
        .map(|v| match v {
            DiscountValue::Percent(bps) => *bps,
            DiscountValue::Fixed(_) => 0,
        })
        .sum();
    let fixed: Money = values
        .iter()
        .map(|v| match v {
            DiscountValue::Percent(_) => Money::zero(),
            DiscountValue::Fixed(amount) => *amount,
        })
        .sum();

    let raw_discount = subtotal.apply_bps(percent_bps) + fixed;

    // Cap at the subtotal: the line clamps at zero rather than going
    // negative, and the order aggregate stays the sum of line totals.
    let discount = if raw_discount > subtotal {
        subtotal
    } else {
        raw_discount
    };

    LineTotals {
        subtotal,
        discount,
        total: subtotal - discount,
    }
}

/// Prices one line item, resolving its discounts from the catalog.
pub fn price_line(item: &LineItem, catalog: &HashMap<String, Discount>) -> LineTotals {
    let values = resolve_discount_values(item, catalog);
    price_line_values(item.unit_price, item.quantity, &values)
}

// =============================================================================
// Order Aggregation
// =============================================================================

/// Prices a whole order: sums line breakdowns, then applies the active tax
/// set once to the discounted base.
///
/// Tax percentages are additive across the active set and applied to
/// `(subtotal − discount)` in a single rounded step.
pub fn price_order(
    items: &[LineItem],
    catalog: &HashMap<String, Discount>,
    taxes: &[ActiveTax],
) -> OrderTotals {
    let mut subtotal = Money::zero();
    let mut discount = Money::zero();

    for item in items {
        let line = price_line(item, catalog);
        subtotal += line.subtotal;
        discount += line.discount;
    }

    let taxable = subtotal - discount;
    let tax_bps: u32 = taxes.iter().map(|t| t.rate.bps()).sum();
    let tax = taxable.apply_bps(tax_bps);

    OrderTotals {
        subtotal,
        discount,
        tax,
        grand_total: taxable + tax,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
