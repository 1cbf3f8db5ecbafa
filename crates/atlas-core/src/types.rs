//! # Domain Types
//!
//! Core domain types for the order staging and settlement subsystem.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    LineItem     │   │  FloatingOrder  │   │   PaymentRow    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  stock_id       │   │  id             │   │  method_id      │       │
//! │  │  unit_price     │   │  status         │   │  amount         │       │
//! │  │  quantity       │   │  items          │   │  notes          │       │
//! │  │  discount_ids   │   │  version        │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                             │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Discount     │   │   OrderStatus   │   │    TaxRate      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Percent (bps)  │   │  Active         │   │  bps (u32)      │       │
//! │  │  or Fixed       │   │  InProgress     │   │  825 = 8.25%    │       │
//! │  │  window, limit  │   │  Billed ⊗       │   └─────────────────┘       │
//! │  └─────────────────┘   │  Cancelled ⊗    │      ⊗ = terminal           │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fungible Key Identity
//! Cart and remote line items are identified by `(stock_id, sorted discount
//! id set)`. Two items with the same key are the same sellable thing and must
//! be merged by summing quantity, never duplicated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01% = 1/10000, so 825 bps = 8.25%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    /// Checks if tax rate is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Active Tax
// =============================================================================

/// A tax that is currently in force for the branch.
///
/// Carries its id so the tax set can be attached to a remote floating order
/// (`add_taxes`) and referenced in the settlement payload.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ActiveTax {
    pub id: String,
    pub name: String,
    pub rate: TaxRate,
}

// =============================================================================
// Line Item
// =============================================================================

/// One unit-priced entry in a cart or floating order.
///
/// ## Invariants
/// - `quantity` ≥ 1; the cart clamps it against per-stock availability
/// - `discount_ids` is order-insensitive: the fungible key sorts it
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineItem {
    /// Identifies the sellable variant this line holds.
    pub stock_id: String,

    /// Name shown to the cashier (frozen at add time).
    pub display_name: String,

    /// Unit price in cents at time of adding (frozen).
    pub unit_price: Money,

    /// Unit cost in cents (for margin reporting downstream).
    pub unit_cost: Money,

    /// Quantity held by this line.
    pub quantity: i64,

    /// Discount ids applied to this line, order-insensitive.
    pub discount_ids: Vec<String>,

    /// Server-assigned line identifier. Present on items read back from the
    /// floating-order service, absent on locally built lines. Not part of
    /// the fungible key.
    pub line_id: Option<String>,
}

impl LineItem {
    /// Returns the identity key under which lines are merged.
    pub fn fungible_key(&self) -> FungibleKey {
        FungibleKey::new(&self.stock_id, &self.discount_ids)
    }

    /// Line subtotal before discounts (unit price × quantity).
    #[inline]
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Checks whether the given discount is applied to this line.
    pub fn has_discount(&self, discount_id: &str) -> bool {
        self.discount_ids.iter().any(|id| id == discount_id)
    }
}

// =============================================================================
// Fungible Key
// =============================================================================

/// The identity of a line item for merge and reconciliation purposes:
/// `(stock_id, sorted discount id set)`.
///
/// Two lines with equal keys are fungible — same stock, same discount set —
/// and must be collapsed into one by summing quantities.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FungibleKey {
    stock_id: String,
    discount_ids: Vec<String>,
}

impl FungibleKey {
    /// Builds a key, sorting and de-duplicating the discount id set so that
    /// insertion order never affects identity.
    pub fn new(stock_id: &str, discount_ids: &[String]) -> Self {
        let mut ids: Vec<String> = discount_ids.to_vec();
        ids.sort();
        ids.dedup();
        FungibleKey {
            stock_id: stock_id.to_string(),
            discount_ids: ids,
        }
    }

    /// The stock id part of the key.
    pub fn stock_id(&self) -> &str {
        &self.stock_id
    }

    /// The normalized (sorted, unique) discount id set.
    pub fn discount_ids(&self) -> &[String] {
        &self.discount_ids
    }
}

// =============================================================================
// Discount
// =============================================================================

/// The reduction a discount applies: a percentage of the line subtotal or a
/// fixed amount. The two are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
#[ts(export)]
pub enum DiscountValue {
    /// Percentage off the line subtotal, in basis points (1000 = 10%).
    Percent(u32),
    /// Fixed amount off the line, in cents.
    Fixed(Money),
}

/// A promotional price reduction attachable to a stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub name: String,

    /// Percent-or-fixed reduction.
    pub value: DiscountValue,

    /// First day the discount is valid (inclusive). `None` = no lower bound.
    #[ts(as = "Option<String>")]
    pub starts_on: Option<NaiveDate>,

    /// Last day the discount is valid (inclusive). `None` = no upper bound.
    #[ts(as = "Option<String>")]
    pub ends_on: Option<NaiveDate>,

    /// Cap on total redemptions. `None` = unlimited.
    pub usage_limit: Option<u32>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle state of a floating order.
///
/// `Billed` and `Cancelled` are terminal: no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum OrderStatus {
    /// Loaded into a cart; its items mirror the cart and are editable.
    Active,
    /// Parked on the server; no terminal has it loaded.
    InProgress,
    /// Settled. Terminal.
    Billed,
    /// Voided. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Returns true for states no transition may leave.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Billed | OrderStatus::Cancelled)
    }

    /// Checks whether a transition from `self` to `next` is allowed.
    ///
    /// ## Transition Table
    /// ```text
    /// active      → in-progress | billed | cancelled
    /// in-progress → active | billed | cancelled
    /// billed      → (none)
    /// cancelled   → (none)
    /// ```
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self != next
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Active => write!(f, "active"),
            OrderStatus::InProgress => write!(f, "in-progress"),
            OrderStatus::Billed => write!(f, "billed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// =============================================================================
// Floating Order
// =============================================================================

/// A server-persisted parked order, shareable across terminals.
///
/// The `version` stamp makes cross-terminal writes conditional: `update` and
/// `bill_out` carry the version the caller last saw, and a stale write is
/// rejected with a version conflict so the caller refetches and retries.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FloatingOrder {
    pub id: String,

    /// Human-readable order reference shown on tickets.
    pub reference_number: String,

    /// Table the order is parked for, if dine-in.
    pub table_label: Option<String>,

    /// Customer attached to the order, if any.
    pub customer_id: Option<String>,

    pub status: OrderStatus,

    pub items: Vec<LineItem>,

    pub subtotal: Money,
    pub grand_total: Money,
    pub total_discount: Money,
    pub total_tax: Money,

    pub notes: Option<String>,

    /// Monotonic write stamp for conditional updates.
    pub version: i64,
}

impl FloatingOrder {
    /// Returns true when the order can no longer be loaded or mutated.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Total quantity held for a fungible key across the order's items.
    ///
    /// Remote orders may legitimately hold several lines with the same key
    /// (appended by successive parks); reconciliation sums them.
    pub fn quantity_for_key(&self, key: &FungibleKey) -> i64 {
        self.items
            .iter()
            .filter(|item| item.fungible_key() == *key)
            .map(|item| item.quantity)
            .sum()
    }
}

// =============================================================================
// Payment Row
// =============================================================================

/// One tender entry in a settlement.
///
/// A row counts toward validity only when it has a method id and a positive
/// amount; the allocator reports violations per row index.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentRow {
    /// Payment method, `None` while the cashier is still picking one.
    pub method_id: Option<String>,

    /// Entered amount in cents.
    pub amount: Money,

    pub notes: Option<String>,
}

impl PaymentRow {
    /// Creates a row with a method and amount, no notes.
    pub fn new(method_id: impl Into<String>, amount: Money) -> Self {
        PaymentRow {
            method_id: Some(method_id.into()),
            amount,
            notes: None,
        }
    }

    /// A row is well-formed when it has a method and a positive amount.
    pub fn is_well_formed(&self) -> bool {
        self.method_id.is_some() && self.amount.is_positive()
    }
}

// =============================================================================
// Cash Register Session
// =============================================================================

/// Status of a cash register session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum SessionStatus {
    Open,
    Closed,
}

/// An open drawer session on a register. External collaborator data: this
/// core reads it as a settlement precondition and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashRegisterSession {
    pub id: String,
    pub cash_register_id: String,
    pub status: SessionStatus,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
}

impl CashRegisterSession {
    /// Returns true when sales may be entered against this session.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == SessionStatus::Open
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(stock_id: &str, qty: i64, discounts: &[&str]) -> LineItem {
        LineItem {
            stock_id: stock_id.to_string(),
            display_name: format!("Item {}", stock_id),
            unit_price: Money::from_cents(1000),
            unit_cost: Money::from_cents(600),
            quantity: qty,
            discount_ids: discounts.iter().map(|s| s.to_string()).collect(),
            line_id: None,
        }
    }

    #[test]
    fn test_fungible_key_ignores_discount_order() {
        let a = line("7", 1, &["d1", "d2"]);
        let b = line("7", 3, &["d2", "d1"]);
        assert_eq!(a.fungible_key(), b.fungible_key());
    }

    #[test]
    fn test_fungible_key_distinguishes_discount_sets() {
        let a = line("7", 1, &["d1"]);
        let b = line("7", 1, &[]);
        let c = line("8", 1, &["d1"]);
        assert_ne!(a.fungible_key(), b.fungible_key());
        assert_ne!(a.fungible_key(), c.fungible_key());
    }

    #[test]
    fn test_fungible_key_dedups() {
        let a = line("7", 1, &["d1", "d1"]);
        let b = line("7", 1, &["d1"]);
        assert_eq!(a.fungible_key(), b.fungible_key());
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::Active.is_terminal());
        assert!(!OrderStatus::InProgress.is_terminal());
        assert!(OrderStatus::Billed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Active.can_transition_to(OrderStatus::InProgress));
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Active));
        assert!(OrderStatus::Active.can_transition_to(OrderStatus::Billed));
        assert!(OrderStatus::InProgress.can_transition_to(OrderStatus::Cancelled));

        assert!(!OrderStatus::Billed.can_transition_to(OrderStatus::Active));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::InProgress));
    }

    #[test]
    fn test_order_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let back: OrderStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(back, OrderStatus::Cancelled);
    }

    #[test]
    fn test_quantity_for_key_sums_duplicate_remote_lines() {
        let order = FloatingOrder {
            id: "o1".into(),
            reference_number: "A-001".into(),
            table_label: None,
            customer_id: None,
            status: OrderStatus::InProgress,
            items: vec![line("7", 2, &[]), line("7", 3, &[]), line("8", 1, &[])],
            subtotal: Money::zero(),
            grand_total: Money::zero(),
            total_discount: Money::zero(),
            total_tax: Money::zero(),
            notes: None,
            version: 1,
        };

        let key = FungibleKey::new("7", &[]);
        assert_eq!(order.quantity_for_key(&key), 5);
    }

    #[test]
    fn test_payment_row_well_formed() {
        assert!(PaymentRow::new("cash", Money::from_cents(100)).is_well_formed());

        let no_method = PaymentRow {
            method_id: None,
            amount: Money::from_cents(100),
            notes: None,
        };
        assert!(!no_method.is_well_formed());

        let zero = PaymentRow::new("cash", Money::zero());
        assert!(!zero.is_well_formed());
    }

    #[test]
    fn test_session_open() {
        let session = CashRegisterSession {
            id: "s1".into(),
            cash_register_id: "reg1".into(),
            status: SessionStatus::Open,
            opened_at: Utc::now(),
        };
        assert!(session.is_open());
    }
}
