//! # Discount Selectability
//!
//! Rules governing whether a discount may be attached to a cart line.
//!
//! A discount is selectable for a line when BOTH hold:
//!
//! 1. Today falls inside the discount's validity window (inclusive on both
//!    ends; an absent bound is open).
//! 2. Its usage limit is not exhausted by OTHER lines of the in-progress
//!    cart. Usage counting is scoped to the cart being built, one committed
//!    usage per cart line holding the discount — never global.
//!
//! A line that already holds the discount may always keep it selected, so the
//! cashier can toggle it off even at the cap.

use chrono::NaiveDate;

use crate::types::{Discount, LineItem};

// =============================================================================
// Validity Window
// =============================================================================

/// Checks whether `today` falls inside the discount's validity window.
///
/// Both bounds are inclusive; a missing bound does not constrain.
///
/// ## Example
/// ```rust
/// use atlas_core::discount::is_within_window;
/// use atlas_core::types::{Discount, DiscountValue};
/// use chrono::NaiveDate;
///
/// let d = Discount {
///     id: "d1".into(),
///     name: "Summer".into(),
///     value: DiscountValue::Percent(1000),
///     starts_on: NaiveDate::from_ymd_opt(2024, 6, 1),
///     ends_on: NaiveDate::from_ymd_opt(2024, 8, 31),
///     usage_limit: None,
/// };
/// assert!(is_within_window(&d, NaiveDate::from_ymd_opt(2024, 8, 31).unwrap()));
/// assert!(!is_within_window(&d, NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()));
/// ```
pub fn is_within_window(discount: &Discount, today: NaiveDate) -> bool {
    if let Some(starts) = discount.starts_on {
        if today < starts {
            return false;
        }
    }
    if let Some(ends) = discount.ends_on {
        if today > ends {
            return false;
        }
    }
    true
}

// =============================================================================
// Usage Counting
// =============================================================================

/// Counts usages of a discount committed by cart lines OTHER than the one
/// being edited.
///
/// `current_line_index` is the position of the line being edited (`None`
/// when selecting for a brand-new line). One usage per line holding the id,
/// regardless of line quantity.
pub fn usages_committed_elsewhere(
    cart_items: &[LineItem],
    discount_id: &str,
    current_line_index: Option<usize>,
) -> u32 {
    cart_items
        .iter()
        .enumerate()
        .filter(|(idx, item)| Some(*idx) != current_line_index && item.has_discount(discount_id))
        .count() as u32
}

// =============================================================================
// Selectability
// =============================================================================

/// Decides whether `discount` is selectable for the cart line at
/// `current_line_index` (or a new line when `None`).
///
/// ## Rules
/// - Out-of-window discounts are never selectable.
/// - A line that already holds the discount keeps it selectable, so
///   deselection stays possible at the cap.
/// - Otherwise the usage limit must leave headroom after counting usages
///   committed by other lines of the same cart.
pub fn is_selectable(
    discount: &Discount,
    today: NaiveDate,
    cart_items: &[LineItem],
    current_line_index: Option<usize>,
) -> bool {
    if !is_within_window(discount, today) {
        return false;
    }

    let already_selected = current_line_index
        .and_then(|idx| cart_items.get(idx))
        .map(|item| item.has_discount(&discount.id))
        .unwrap_or(false);
    if already_selected {
        return true;
    }

    match discount.usage_limit {
        None => true,
        Some(limit) => {
            let committed =
                usages_committed_elsewhere(cart_items, &discount.id, current_line_index);
            limit > committed
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
