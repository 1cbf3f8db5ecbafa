//! # Payment Allocator
//!
//! Validates and normalizes a set of payment rows against an order's grand
//! total, computing cash-needed, total paid, change, and shortfall — all in
//! integer cents.
//!
//! ## Allocation Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  non_cash     = Σ amount where method is not cash                       │
//! │  cash_entered = Σ amount where method is cash                           │
//! │  cash_needed  = max(0, grand_total − non_cash)                          │
//! │  total_paid   = non_cash + cash_entered                                 │
//! │  change       = max(0, cash_entered − cash_needed)                      │
//! │  remaining    = max(0, grand_total − total_paid)                        │
//! │                                                                         │
//! │  valid ⇔ total_paid ≥ grand_total                                       │
//! │          AND every row has a method id and a positive amount            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-cash tender is assumed exact (card/e-wallet charges the due amount),
//! so only cash rows can produce change. On confirmation, cash rows are
//! rewritten to the exact cash-needed amount when non-cash rows exist, so the
//! settlement record reflects tender due rather than over-tender; change is
//! reported separately.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::PaymentRow;

// =============================================================================
// Payment Error
// =============================================================================

/// Local tender validation failures. All of these block confirmation before
/// any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Total tendered does not cover the grand total.
    #[error("Insufficient payment: remaining {remaining}")]
    InsufficientPayment { remaining: Money },

    /// A row has no payment method selected.
    #[error("Payment row {index} has no method selected")]
    MissingMethod { index: usize },

    /// A row's amount is zero or negative.
    #[error("Payment row {index} must have a positive amount")]
    NonPositiveAmount { index: usize },

    /// The loyalty flag is set but no customer is attached to the sale.
    #[error("A customer must be selected for a loyalty sale")]
    CustomerRequired,

    /// No payment rows were entered at all.
    #[error("At least one payment row is required")]
    EmptyTender,
}

// =============================================================================
// Tender Breakdown
// =============================================================================

/// The allocator's computed view of a tender set against a grand total.
///
/// All fields are derived; recompute on every row edit rather than mutating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct TenderBreakdown {
    /// The order total the rows were allocated against.
    pub grand_total: Money,

    /// Sum of non-cash rows.
    pub non_cash: Money,

    /// Sum of cash rows as entered.
    pub cash_entered: Money,

    /// Portion of the grand total that cash must cover.
    pub cash_needed: Money,

    /// Everything tendered, cash and non-cash.
    pub total_paid: Money,

    /// Cash to hand back.
    pub change: Money,

    /// Shortfall still owed. Zero when fully covered.
    pub remaining: Money,

    /// True when every row has a method id and a positive amount.
    pub rows_well_formed: bool,
}

impl TenderBreakdown {
    /// A tender is confirmable when it covers the total and every row is
    /// well-formed.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.rows_well_formed && self.total_paid >= self.grand_total
    }
}

// =============================================================================
// Allocation
// =============================================================================

/// Computes the tender breakdown for a set of payment rows.
///
/// `is_cash_method` classifies method ids; rows without a method id count as
/// non-cash for the arithmetic (they already fail well-formedness).
///
/// ## Example
/// ```rust
/// use atlas_core::money::Money;
/// use atlas_core::payment::allocate;
/// use atlas_core::types::PaymentRow;
///
/// // ¤150.00 due, one cash row of ¤200.00
/// let rows = vec![PaymentRow::new("cash", Money::from_cents(20000))];
/// let breakdown = allocate(&rows, Money::from_cents(15000), |m| m == "cash");
///
/// assert_eq!(breakdown.cash_needed.cents(), 15000);
/// assert_eq!(breakdown.change.cents(), 5000);
/// assert!(breakdown.is_valid());
/// ```
pub fn allocate(
    rows: &[PaymentRow],
    grand_total: Money,
    is_cash_method: impl Fn(&str) -> bool,
) -> TenderBreakdown {
    let mut non_cash = Money::zero();
    let mut cash_entered = Money::zero();

    for row in rows {
        let is_cash = row
            .method_id
            .as_deref()
            .map(&is_cash_method)
            .unwrap_or(false);
        if is_cash {
            cash_entered += row.amount;
        } else {
            non_cash += row.amount;
        }
    }

    let cash_needed = grand_total.saturating_sub_zero(non_cash);
    let total_paid = non_cash + cash_entered;

    TenderBreakdown {
        grand_total,
        non_cash,
        cash_entered,
        cash_needed,
        total_paid,
        change: cash_entered.saturating_sub_zero(cash_needed),
        remaining: grand_total.saturating_sub_zero(total_paid),
        rows_well_formed: !rows.is_empty() && rows.iter().all(|r| r.is_well_formed()),
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a tender set for confirmation. First violation wins; nothing is
/// submitted anywhere on failure.
///
/// `loyalty` marks a loyalty sale, which requires `customer_id`.
pub fn validate(
    rows: &[PaymentRow],
    breakdown: &TenderBreakdown,
    loyalty: bool,
    customer_id: Option<&str>,
) -> Result<(), PaymentError> {
    if loyalty && customer_id.is_none() {
        return Err(PaymentError::CustomerRequired);
    }

    if rows.is_empty() {
        return Err(PaymentError::EmptyTender);
    }

    for (index, row) in rows.iter().enumerate() {
        if row.method_id.is_none() {
            return Err(PaymentError::MissingMethod { index });
        }
        if !row.amount.is_positive() {
            return Err(PaymentError::NonPositiveAmount { index });
        }
    }

    if breakdown.total_paid < breakdown.grand_total {
        return Err(PaymentError::InsufficientPayment {
            remaining: breakdown.remaining,
        });
    }

    Ok(())
}

// =============================================================================
// Normalization
// =============================================================================

/// Rewrites the rows into the amounts that get submitted for settlement.
///
/// When non-cash rows exist, each cash row's submitted amount becomes the
/// exact cash-needed figure instead of the raw entered amount, so the
/// settlement record reflects tender due; change is carried separately in the
/// breakdown. Pure-cash tenders submit entered amounts unchanged, as the
/// bill-out payload already carries paid-amount and change side by side.
pub fn normalize_for_submission(
    rows: &[PaymentRow],
    breakdown: &TenderBreakdown,
    is_cash_method: impl Fn(&str) -> bool,
) -> Vec<PaymentRow> {
    let has_non_cash = rows.iter().any(|row| {
        !row.method_id
            .as_deref()
            .map(&is_cash_method)
            .unwrap_or(false)
    });

    rows.iter()
        .map(|row| {
            let is_cash = row
                .method_id
                .as_deref()
                .map(&is_cash_method)
                .unwrap_or(false);
            if is_cash && has_non_cash {
                PaymentRow {
                    amount: breakdown.cash_needed,
                    ..row.clone()
                }
            } else {
                row.clone()
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
