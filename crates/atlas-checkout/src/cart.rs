//! # Cart Store
//!
//! The local, mutable working order. Entries merge under the fungible key
//! `(stock_id, sorted discount ids)` — two entries with the same key never
//! coexist — and every quantity is clamped against what the stock can still
//! commit once other entries of the same stock are accounted for.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart State Operations                                │
//! │                                                                         │
//! │  Host Action              CartState                Cart Change          │
//! │  ───────────              ─────────                ───────────          │
//! │  Pick product ──────────► add_line() ────────────► merge or append     │
//! │  Edit quantity ─────────► set_quantity() ────────► clamp to [1, avail] │
//! │  Toggle discount ───────► toggle_discount() ─────► re-key, re-merge    │
//! │  Remove line ───────────► remove_entry() ────────► entries.remove      │
//! │  Load parked order ─────► replace_all() ─────────► discard + reload    │
//! │  Clear ─────────────────► clear() ───────────────► entries.clear       │
//! │                                                                         │
//! │  Every mutation publishes CartChanged; a non-empty → empty transition   │
//! │  additionally publishes CartEmptied (observed by the lifecycle          │
//! │  controller to drive the debounced auto-park).                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No network calls originate here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use atlas_core::pricing::price_order;
use atlas_core::validation::{validate_cart_size, validate_display_name, validate_quantity};
use atlas_core::{
    discount, ActiveTax, CoreError, CoreResult, Discount, LineItem, OrderTotals, MAX_LINE_QUANTITY,
};

use crate::events::{CheckoutEvent, EventBus};

// =============================================================================
// Cart Entry
// =============================================================================

/// One cart line plus its local identity.
///
/// `entry_id` identifies the row in the UI; the fungible key identifies the
/// merchandise. Merging preserves the surviving entry's id.
#[derive(Debug, Clone)]
pub struct CartEntry {
    pub entry_id: String,
    pub item: LineItem,
}

impl CartEntry {
    fn new(item: LineItem) -> Self {
        CartEntry {
            entry_id: Uuid::new_v4().to_string(),
            item,
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The working order being built on this terminal.
///
/// ## Invariants
/// - Entries are unique by fungible key (merge on add, re-merge on discount
///   toggle)
/// - Every entry's quantity respects its stock's availability minus what
///   other entries of the same stock already hold
#[derive(Debug, Clone, Default)]
pub struct Cart {
    entries: Vec<CartEntry>,

    /// When the cart was created/last cleared.
    pub created_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Creates a new empty cart.
    pub fn new() -> Self {
        Cart {
            entries: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// All entries in display order.
    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    /// A snapshot of the line items (for pricing and reconciliation).
    pub fn items(&self) -> Vec<LineItem> {
        self.entries.iter().map(|e| e.item.clone()).collect()
    }

    /// Checks if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total quantity across all entries.
    pub fn total_quantity(&self) -> i64 {
        self.entries.iter().map(|e| e.item.quantity).sum()
    }

    /// Finds an entry by id.
    pub fn entry(&self, entry_id: &str) -> Option<&CartEntry> {
        self.entries.iter().find(|e| e.entry_id == entry_id)
    }

    /// Quantity held by entries of `stock_id`, excluding `exclude_entry_id`.
    ///
    /// This is the "committed elsewhere" figure the availability clamp
    /// subtracts from the stock's on-hand quantity.
    pub fn held_for_stock(&self, stock_id: &str, exclude_entry_id: Option<&str>) -> i64 {
        self.entries
            .iter()
            .filter(|e| e.item.stock_id == stock_id && Some(e.entry_id.as_str()) != exclude_entry_id)
            .map(|e| e.item.quantity)
            .sum()
    }

    /// Prices the cart with the given discount catalog and active tax set.
    ///
    /// Recomputed on every read; totals are never stored.
    pub fn totals(&self, catalog: &HashMap<String, Discount>, taxes: &[ActiveTax]) -> OrderTotals {
        let items = self.items();
        price_order(&items, catalog, taxes)
    }

    // -------------------------------------------------------------------------
    // Mutations
    // -------------------------------------------------------------------------

    /// Adds a line, merging into an existing entry with the same fungible
    /// key or appending a new one.
    ///
    /// ## Errors
    /// - `StockUnavailable` when `available_stock` minus quantity already
    ///   held by other entries of the same stock cannot cover the request
    /// - `QuantityTooLarge` when the merged quantity would exceed the line cap
    /// - `Validation` when a new entry would exceed the entry cap
    ///
    /// ## Returns
    /// The id of the entry that now holds the merchandise.
    pub fn add_line(&mut self, item: LineItem, available_stock: i64) -> CoreResult<String> {
        validate_quantity(item.quantity)?;
        validate_display_name(&item.display_name)?;

        let key = item.fungible_key();
        let target_idx = self
            .entries
            .iter()
            .position(|e| e.item.fungible_key() == key);

        let exclude = target_idx.map(|idx| self.entries[idx].entry_id.clone());
        let held_elsewhere = self.held_for_stock(&item.stock_id, exclude.as_deref());
        let held_on_target = target_idx.map(|idx| self.entries[idx].item.quantity).unwrap_or(0);

        let remaining = available_stock - held_elsewhere - held_on_target;
        if item.quantity > remaining {
            return Err(CoreError::StockUnavailable {
                stock_id: item.stock_id,
                available: remaining.max(0),
                requested: item.quantity,
            });
        }

        match target_idx {
            Some(idx) => {
                let new_qty = held_on_target + item.quantity;
                if new_qty > MAX_LINE_QUANTITY {
                    return Err(CoreError::QuantityTooLarge {
                        requested: new_qty,
                        max: MAX_LINE_QUANTITY,
                    });
                }
                self.entries[idx].item.quantity = new_qty;
                debug!(entry_id = %self.entries[idx].entry_id, quantity = new_qty, "merged cart line");
                Ok(self.entries[idx].entry_id.clone())
            }
            None => {
                validate_cart_size(self.entries.len())?;
                let entry = CartEntry::new(item);
                let entry_id = entry.entry_id.clone();
                debug!(entry_id = %entry_id, "appended cart line");
                self.entries.push(entry);
                Ok(entry_id)
            }
        }
    }

    /// Sets an entry's quantity, clamping to `[1, available]` where available
    /// is the stock's quantity minus what other entries of the same stock
    /// hold (and never above the line cap).
    ///
    /// ## Returns
    /// The quantity actually stored after clamping.
    pub fn set_quantity(
        &mut self,
        entry_id: &str,
        quantity: i64,
        available_stock: i64,
    ) -> CoreResult<i64> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.entry_id == entry_id)
            .ok_or_else(|| CoreError::EntryNotFound(entry_id.to_string()))?;

        let stock_id = self.entries[idx].item.stock_id.clone();
        let held_elsewhere = self.held_for_stock(&stock_id, Some(entry_id));
        let ceiling = (available_stock - held_elsewhere).min(MAX_LINE_QUANTITY);

        let clamped = quantity.clamp(1, ceiling.max(1));
        self.entries[idx].item.quantity = clamped;
        debug!(entry_id = %entry_id, requested = quantity, stored = clamped, "set cart quantity");
        Ok(clamped)
    }

    /// Removes an entry by id.
    pub fn remove_entry(&mut self, entry_id: &str) -> CoreResult<()> {
        let initial_len = self.entries.len();
        self.entries.retain(|e| e.entry_id != entry_id);

        if self.entries.len() == initial_len {
            Err(CoreError::EntryNotFound(entry_id.to_string()))
        } else {
            Ok(())
        }
    }

    /// Replaces the whole cart with the given items (used when a floating
    /// order is loaded). NOT additive: prior contents are discarded.
    ///
    /// Remote orders may carry several lines under one fungible key
    /// (successive parks append); they collapse into one entry here.
    pub fn replace_all(&mut self, items: Vec<LineItem>) {
        self.entries.clear();
        self.created_at = Some(Utc::now());

        for mut item in items {
            item.line_id = None;
            let key = item.fungible_key();
            match self
                .entries
                .iter_mut()
                .find(|e| e.item.fungible_key() == key)
            {
                Some(existing) => existing.item.quantity += item.quantity,
                None => self.entries.push(CartEntry::new(item)),
            }
        }
    }

    /// Clears all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.created_at = Some(Utc::now());
    }

    /// Toggles a discount on an entry, enforcing selectability.
    ///
    /// Selecting re-keys the line; if another entry already holds the new
    /// key, the two merge (the toggled entry survives). Deselecting is
    /// always allowed.
    ///
    /// ## Returns
    /// `true` when the discount is now selected, `false` when deselected.
    pub fn toggle_discount(
        &mut self,
        entry_id: &str,
        discount: &Discount,
        today: NaiveDate,
    ) -> CoreResult<bool> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.entry_id == entry_id)
            .ok_or_else(|| CoreError::EntryNotFound(entry_id.to_string()))?;

        if self.entries[idx].item.has_discount(&discount.id) {
            self.entries[idx]
                .item
                .discount_ids
                .retain(|id| id != &discount.id);
            self.merge_duplicate_of(idx);
            return Ok(false);
        }

        let items = self.items();
        if !discount::is_selectable(discount, today, &items, Some(idx)) {
            return Err(CoreError::DiscountNotSelectable {
                discount_id: discount.id.clone(),
            });
        }

        self.entries[idx].item.discount_ids.push(discount.id.clone());
        self.merge_duplicate_of(idx);
        Ok(true)
    }

    /// After a re-key, folds any OTHER entry sharing `idx`'s fungible key
    /// into the entry at `idx`.
    fn merge_duplicate_of(&mut self, idx: usize) {
        let key = self.entries[idx].item.fungible_key();
        let duplicate = self
            .entries
            .iter()
            .enumerate()
            .find(|(found, e)| *found != idx && e.item.fungible_key() == key)
            .map(|(found, _)| found);

        if let Some(dup_idx) = duplicate {
            let absorbed = self.entries.remove(dup_idx);
            // Removal may have shifted our index left.
            let idx = if dup_idx < idx { idx - 1 } else { idx };
            self.entries[idx].item.quantity += absorbed.item.quantity;
            debug!(
                survivor = %self.entries[idx].entry_id,
                absorbed = %absorbed.entry_id,
                "merged re-keyed cart lines"
            );
        }
    }
}

// =============================================================================
// Cart State
// =============================================================================

/// Shared, observable cart state.
///
/// ## Thread Safety
/// Wrapped in `Arc<Mutex<Cart>>`: commands may run concurrently but cart
/// mutations are exclusive, and no lock is held across an await.
#[derive(Debug, Clone)]
pub struct CartState {
    cart: Arc<Mutex<Cart>>,
    events: EventBus,
}

impl CartState {
    /// Creates an empty cart publishing to the given bus.
    pub fn new(events: EventBus) -> Self {
        CartState {
            cart: Arc::new(Mutex::new(Cart::new())),
            events,
        }
    }

    /// Executes a function with read access to the cart.
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.cart.lock().expect("cart mutex poisoned");
        f(&cart)
    }

    /// Executes a mutation and publishes the resulting cart events:
    /// `CartChanged` always, plus `CartEmptied` on a non-empty → empty
    /// transition.
    pub fn with_cart_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let (result, entry_count, total_quantity, emptied) = {
            let mut cart = self.cart.lock().expect("cart mutex poisoned");
            let was_empty = cart.is_empty();
            let result = f(&mut cart);
            (
                result,
                cart.entry_count(),
                cart.total_quantity(),
                !was_empty && cart.is_empty(),
            )
        };

        self.events.publish(CheckoutEvent::CartChanged {
            entry_count,
            total_quantity,
        });
        if emptied {
            self.events.publish(CheckoutEvent::CartEmptied);
        }
        result
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_core::types::DiscountValue;
    use atlas_core::Money;

    fn item(stock_id: &str, qty: i64, discounts: &[&str]) -> LineItem {
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

    fn plain_discount(id: &str, usage_limit: Option<u32>) -> Discount {
        Discount {
            id: id.to_string(),
            name: format!("{} promo", id),
            value: DiscountValue::Percent(1000),
            starts_on: None,
            ends_on: None,
            usage_limit,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_add_appends_then_merges_by_fungible_key() {
        let mut cart = Cart::new();

        let first = cart.add_line(item("7", 2, &[]), 100).unwrap();
        let second = cart.add_line(item("7", 3, &[]), 100).unwrap();

        // Same key: the second add incremented the first entry.
        assert_eq!(first, second);
        assert_eq!(cart.entry_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_merge_ignores_discount_order() {
        let mut cart = Cart::new();
        cart.add_line(item("7", 1, &["a", "b"]), 100).unwrap();
        cart.add_line(item("7", 1, &["b", "a"]), 100).unwrap();

        assert_eq!(cart.entry_count(), 1);
        assert_eq!(cart.total_quantity(), 2);
    }

    #[test]
    fn test_different_discount_sets_stay_separate() {
        let mut cart = Cart::new();
        cart.add_line(item("7", 1, &["a"]), 100).unwrap();
        cart.add_line(item("7", 1, &[]), 100).unwrap();

        assert_eq!(cart.entry_count(), 2);
    }

    #[test]
    fn test_add_respects_availability_across_entries() {
        // Stock 7 has 5 on hand; the discounted entry holds 3, so only 2
        // remain for the plain entry.
        let mut cart = Cart::new();
        cart.add_line(item("7", 3, &["a"]), 5).unwrap();

        let err = cart.add_line(item("7", 3, &[]), 5).unwrap_err();
        match err {
            CoreError::StockUnavailable {
                available,
                requested,
                ..
            } => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("expected StockUnavailable, got {other:?}"),
        }

        assert!(cart.add_line(item("7", 2, &[]), 5).is_ok());
    }

    #[test]
    fn test_set_quantity_clamps_to_available() {
        let mut cart = Cart::new();
        let entry = cart.add_line(item("7", 1, &[]), 10).unwrap();

        // Request far above availability: clamped to 10.
        assert_eq!(cart.set_quantity(&entry, 50, 10).unwrap(), 10);
        // Request below 1: clamped to 1.
        assert_eq!(cart.set_quantity(&entry, 0, 10).unwrap(), 1);
        assert_eq!(cart.set_quantity(&entry, -3, 10).unwrap(), 1);
    }

    #[test]
    fn test_set_quantity_accounts_for_other_entries() {
        let mut cart = Cart::new();
        cart.add_line(item("7", 4, &["a"]), 10).unwrap();
        let entry = cart.add_line(item("7", 1, &[]), 10).unwrap();

        // 10 on hand, 4 held by the other entry: ceiling is 6.
        assert_eq!(cart.set_quantity(&entry, 9, 10).unwrap(), 6);
    }

    #[test]
    fn test_remove_entry() {
        let mut cart = Cart::new();
        let entry = cart.add_line(item("7", 1, &[]), 10).unwrap();

        cart.remove_entry(&entry).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(
            cart.remove_entry(&entry),
            Err(CoreError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_replace_all_discards_and_collapses() {
        let mut cart = Cart::new();
        cart.add_line(item("1", 5, &[]), 100).unwrap();

        // Remote order with two lines under one key.
        cart.replace_all(vec![item("7", 2, &[]), item("7", 3, &[]), item("8", 1, &[])]);

        assert_eq!(cart.entry_count(), 2);
        assert_eq!(cart.held_for_stock("7", None), 5);
        assert_eq!(cart.held_for_stock("1", None), 0);
    }

    #[test]
    fn test_toggle_discount_selects_and_deselects() {
        let mut cart = Cart::new();
        let entry = cart.add_line(item("7", 2, &[]), 100).unwrap();
        let d = plain_discount("d1", None);

        assert!(cart.toggle_discount(&entry, &d, today()).unwrap());
        assert!(cart.entry(&entry).unwrap().item.has_discount("d1"));

        assert!(!cart.toggle_discount(&entry, &d, today()).unwrap());
        assert!(!cart.entry(&entry).unwrap().item.has_discount("d1"));
    }

    #[test]
    fn test_toggle_discount_enforces_usage_limit() {
        let mut cart = Cart::new();
        let d = plain_discount("d1", Some(1));

        let first = cart.add_line(item("7", 1, &[]), 100).unwrap();
        cart.toggle_discount(&first, &d, today()).unwrap();

        let second = cart.add_line(item("8", 1, &[]), 100).unwrap();
        assert!(matches!(
            cart.toggle_discount(&second, &d, today()),
            Err(CoreError::DiscountNotSelectable { .. })
        ));

        // The holding line can still toggle it off.
        assert!(!cart.toggle_discount(&first, &d, today()).unwrap());
    }

    #[test]
    fn test_toggle_discount_remerges_entries() {
        // Deselecting the discount re-keys the line to match the plain
        // entry; the two must collapse.
        let mut cart = Cart::new();
        let d = plain_discount("d1", None);

        let discounted = cart.add_line(item("7", 2, &[]), 100).unwrap();
        cart.toggle_discount(&discounted, &d, today()).unwrap();
        cart.add_line(item("7", 3, &[]), 100).unwrap();
        assert_eq!(cart.entry_count(), 2);

        cart.toggle_discount(&discounted, &d, today()).unwrap();

        assert_eq!(cart.entry_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_totals_price_the_cart() {
        let mut cart = Cart::new();
        cart.add_line(item("7", 3, &[]), 100).unwrap();

        let catalog = HashMap::new();
        let taxes = vec![ActiveTax {
            id: "vat".into(),
            name: "VAT".into(),
            rate: atlas_core::TaxRate::from_bps(1000),
        }];
        let totals = cart.totals(&catalog, &taxes);

        assert_eq!(totals.subtotal.cents(), 3000);
        assert_eq!(totals.tax.cents(), 300);
        assert_eq!(totals.grand_total.cents(), 3300);
    }

    #[tokio::test]
    async fn test_cart_state_publishes_emptied_once() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let state = CartState::new(bus);

        let entry = state
            .with_cart_mut(|c| c.add_line(item("7", 1, &[]), 10))
            .unwrap();
        state.with_cart_mut(|c| c.remove_entry(&entry)).unwrap();

        let mut emptied = 0;
        while let Ok(event) = rx.try_recv() {
            if event == CheckoutEvent::CartEmptied {
                emptied += 1;
            }
        }
        assert_eq!(emptied, 1);

        // Clearing an already-empty cart publishes no second CartEmptied.
        state.with_cart_mut(|c| c.clear());
        let mut emptied_again = 0;
        while let Ok(event) = rx.try_recv() {
            if event == CheckoutEvent::CartEmptied {
                emptied_again += 1;
            }
        }
        assert_eq!(emptied_again, 0);
    }
}
