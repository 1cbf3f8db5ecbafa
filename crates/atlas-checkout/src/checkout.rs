//! # Checkout Orchestrator
//!
//! Wires the cart, the order lifecycle, the session gate, the caches, and
//! the external collaborators into the staging workflow the host UI drives.
//!
//! ## Control Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  user action ──► CartState mutation ──► totals recomputed on read      │
//! │                                                                         │
//! │  "park" / cart emptied ──► reconcile deltas ──► order in-progress,     │
//! │                            (sequential adds)    cart cleared, unlink    │
//! │                                                                         │
//! │  "complete" ──► session gate ──► allocate/validate tender ──► submit   │
//! │                 (fail closed)    (local, no network on failure)         │
//! │                                      │                                  │
//! │                                      ▼                                  │
//! │                            bill out linked order, clear, unlink        │
//! │                                                                         │
//! │  branch switch ──► HARD CANCEL: unlink first (stale completions are    │
//! │                    ignored by link-id comparison), clear cart,          │
//! │                    invalidate caches                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;
use tracing::{debug, info, warn};

use atlas_core::payment::{allocate, normalize_for_submission, validate};
use atlas_core::pricing::price_order;
use atlas_core::validation::validate_tax_rate_bps;
use atlas_core::{
    ActiveTax, CoreResult, Discount, FloatingOrder, LineItem, OrderTotals, PaymentRow,
    TenderBreakdown,
};

use crate::cache::TtlCache;
use crate::cart::CartState;
use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::events::{CheckoutEvent, EventBus};
use crate::lifecycle::OrderLifecycle;
use crate::reconcile::{self, ReconcileOutcome};
use crate::repository::{
    BillOutRequest, CreateOrderOutcome, CreateOrderRequest, FloatingOrderRepository, OrderPatch,
    RepositoryError,
};
use crate::session::{SessionGuard, SessionProvider};
use crate::settlement::{self, SettlementContext, SettlementGateway, SettlementReceipt};

// =============================================================================
// Tender Options
// =============================================================================

/// Per-settlement flags the cashier controls.
#[derive(Debug, Clone, Default)]
pub struct TenderOptions {
    pub is_dine_in: bool,
    /// Loyalty sale: requires `customer_id`.
    pub loyalty: bool,
    pub customer_id: Option<String>,
}

/// A finished settlement: the posted receipt plus the tender math the UI
/// shows (change due back, amounts per method).
#[derive(Debug, Clone)]
pub struct CompletedSale {
    pub receipt: SettlementReceipt,
    pub breakdown: TenderBreakdown,
}

// =============================================================================
// Checkout
// =============================================================================

/// The order staging and settlement subsystem, one instance per terminal.
pub struct Checkout {
    config: CheckoutConfig,
    repo: Arc<dyn FloatingOrderRepository>,
    gateway: Arc<dyn SettlementGateway>,
    session_guard: SessionGuard,
    cart: CartState,
    lifecycle: OrderLifecycle,
    events: EventBus,
    parked_orders: TtlCache<Vec<FloatingOrder>>,

    discounts: Mutex<HashMap<String, Discount>>,
    taxes: Mutex<Vec<ActiveTax>>,
    branch_id: Mutex<String>,

    /// Self-handle for spawning the debounced auto-park task.
    self_ref: Weak<Checkout>,
}

impl Checkout {
    /// Builds the subsystem around the host-provided collaborators.
    pub fn new(
        repo: Arc<dyn FloatingOrderRepository>,
        gateway: Arc<dyn SettlementGateway>,
        sessions: Arc<dyn SessionProvider>,
        branch_id: impl Into<String>,
        config: CheckoutConfig,
    ) -> Arc<Self> {
        let events = EventBus::new(config.event_capacity);
        let orders_ttl = config.orders_cache_ttl();

        Arc::new_cyclic(|weak| Checkout {
            repo,
            gateway,
            session_guard: SessionGuard::new(sessions, events.clone()),
            cart: CartState::new(events.clone()),
            lifecycle: OrderLifecycle::new(),
            parked_orders: TtlCache::new(orders_ttl),
            discounts: Mutex::new(HashMap::new()),
            taxes: Mutex::new(Vec::new()),
            branch_id: Mutex::new(branch_id.into()),
            self_ref: weak.clone(),
            events,
            config,
        })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The event bus; subscribe for UI updates.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// The cart state (read access for rendering).
    pub fn cart(&self) -> &CartState {
        &self.cart
    }

    /// The session gate.
    pub fn session_gate(&self) -> &SessionGuard {
        &self.session_guard
    }

    /// Currently linked floating order id, if any.
    pub fn linked_order(&self) -> Option<String> {
        self.lifecycle.linked_order()
    }

    /// Current branch context.
    pub fn branch_id(&self) -> String {
        self.branch_id.lock().expect("branch mutex poisoned").clone()
    }

    // -------------------------------------------------------------------------
    // Catalogs
    // -------------------------------------------------------------------------

    /// Replaces the discount catalog used for pricing and selectability.
    pub fn set_discount_catalog(&self, discounts: Vec<Discount>) {
        let mut catalog = self.discounts.lock().expect("catalog mutex poisoned");
        *catalog = discounts.into_iter().map(|d| (d.id.clone(), d)).collect();
    }

    /// Replaces the active tax set applied to every order.
    pub fn set_active_taxes(&self, taxes: Vec<ActiveTax>) -> CoreResult<()> {
        for tax in &taxes {
            validate_tax_rate_bps(tax.rate.bps())?;
        }
        *self.taxes.lock().expect("taxes mutex poisoned") = taxes;
        Ok(())
    }

    /// Relays an external stock-availability change to subscribers.
    pub fn notify_stock_updated(&self, stock_id: impl Into<String>) {
        self.events.publish(CheckoutEvent::StockUpdated {
            stock_id: stock_id.into(),
        });
    }

    // -------------------------------------------------------------------------
    // Cart Operations
    // -------------------------------------------------------------------------

    /// Prices the cart against the current catalog and tax set.
    pub fn totals(&self) -> OrderTotals {
        let catalog = self.discounts.lock().expect("catalog mutex poisoned").clone();
        let taxes = self.taxes.lock().expect("taxes mutex poisoned").clone();
        self.cart.with_cart(|cart| cart.totals(&catalog, &taxes))
    }

    /// Adds a line to the cart (merging under its fungible key).
    pub fn add_to_cart(&self, item: LineItem, available_stock: i64) -> CheckoutResult<String> {
        let entry = self
            .cart
            .with_cart_mut(|cart| cart.add_line(item, available_stock))?;
        Ok(entry)
    }

    /// Sets a cart entry's quantity; returns the clamped value stored.
    pub fn set_quantity(
        &self,
        entry_id: &str,
        quantity: i64,
        available_stock: i64,
    ) -> CheckoutResult<i64> {
        let stored = self
            .cart
            .with_cart_mut(|cart| cart.set_quantity(entry_id, quantity, available_stock))?;
        Ok(stored)
    }

    /// Removes a cart entry. An emptied cart schedules the debounced
    /// auto-park of the linked order.
    pub fn remove_entry(&self, entry_id: &str) -> CheckoutResult<()> {
        self.cart.with_cart_mut(|cart| cart.remove_entry(entry_id))?;
        self.maybe_schedule_auto_park();
        Ok(())
    }

    /// Clears the cart. An emptied cart schedules the debounced auto-park.
    pub fn clear_cart(&self) {
        self.cart.with_cart_mut(|cart| cart.clear());
        self.maybe_schedule_auto_park();
    }

    /// Toggles a catalog discount on a cart entry, enforcing selectability.
    pub fn toggle_discount(&self, entry_id: &str, discount_id: &str) -> CheckoutResult<bool> {
        let discount = {
            let catalog = self.discounts.lock().expect("catalog mutex poisoned");
            catalog.get(discount_id).cloned()
        }
        .ok_or_else(|| {
            CheckoutError::Core(atlas_core::CoreError::DiscountNotSelectable {
                discount_id: discount_id.to_string(),
            })
        })?;

        let today = Utc::now().date_naive();
        let selected = self
            .cart
            .with_cart_mut(|cart| cart.toggle_discount(entry_id, &discount, today))?;
        Ok(selected)
    }

    // -------------------------------------------------------------------------
    // Floating Order Operations
    // -------------------------------------------------------------------------

    /// Creates a parked order (or reuses the table's existing one) and links
    /// it to this cart.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> CheckoutResult<CreateOrderOutcome> {
        let outcome = self.repo.create(request).await?;
        self.lifecycle.link(&outcome.order.id);
        self.parked_orders.invalidate();
        self.events.publish(CheckoutEvent::OrderLinked {
            order_id: outcome.order.id.clone(),
        });
        info!(order_id = %outcome.order.id, existing = outcome.existing, "floating order linked");
        Ok(outcome)
    }

    /// Loads a parked order into the cart, REPLACING the cart's contents,
    /// and marks it active.
    pub async fn load_order(&self, order_id: &str) -> CheckoutResult<FloatingOrder> {
        let _guard = self
            .lifecycle
            .begin_transition(order_id)
            .ok_or_else(|| CheckoutError::TransitionInFlight {
                order_id: order_id.to_string(),
            })?;

        let order = match self.repo.get(order_id).await {
            Ok(order) => order,
            Err(RepositoryError::NotFound { .. }) => return Err(self.mark_stale(order_id)),
            Err(other) => return Err(other.into()),
        };
        if order.is_terminal() {
            return Err(self.mark_stale(order_id));
        }

        // Resuming a parked order claims it for this terminal.
        let order = if order.status == atlas_core::OrderStatus::InProgress {
            let patch = OrderPatch::status_only(atlas_core::OrderStatus::Active, order.version);
            match self.repo.update(order_id, patch).await {
                Ok(updated) => updated,
                Err(RepositoryError::NotFound { .. }) => return Err(self.mark_stale(order_id)),
                Err(other) => return Err(other.into()),
            }
        } else {
            order
        };

        self.cart
            .with_cart_mut(|cart| cart.replace_all(order.items.clone()));
        self.lifecycle.link(order_id);
        self.events.publish(CheckoutEvent::OrderLinked {
            order_id: order_id.to_string(),
        });
        info!(order_id = %order_id, items = order.items.len(), "floating order loaded into cart");
        Ok(order)
    }

    /// Parks the cart against the linked floating order: pushes add-deltas,
    /// attaches taxes, moves the order to in-progress, clears the cart.
    pub async fn park_order(&self) -> CheckoutResult<ReconcileOutcome> {
        let order_id = self.lifecycle.linked_order().ok_or(CheckoutError::NoLinkedOrder)?;

        let _guard = self
            .lifecycle
            .begin_transition(&order_id)
            .ok_or_else(|| CheckoutError::TransitionInFlight {
                order_id: order_id.clone(),
            })?;

        let items = self.cart.with_cart(|cart| cart.items());
        let tax_ids: Vec<String> = {
            let taxes = self.taxes.lock().expect("taxes mutex poisoned");
            taxes.iter().map(|t| t.id.clone()).collect()
        };

        let outcome = match reconcile::run(self.repo.as_ref(), &order_id, &items, &tax_ids).await {
            Ok(outcome) => outcome,
            Err(CheckoutError::Repository(RepositoryError::NotFound { .. })) => {
                return Err(self.mark_stale(&order_id));
            }
            Err(other) => return Err(other),
        };

        // Unlink BEFORE clearing so the CartEmptied this clear publishes
        // cannot schedule a second park.
        self.lifecycle.unlink();
        self.cart.with_cart_mut(|cart| cart.clear());
        self.parked_orders.invalidate();

        let added_lines = match outcome {
            ReconcileOutcome::Applied { added_lines } => added_lines,
            ReconcileOutcome::NoChanges => 0,
        };
        self.events.publish(CheckoutEvent::OrderParked {
            order_id: order_id.clone(),
            added_lines,
        });
        Ok(outcome)
    }

    /// Cancels a floating order (the host confirms with the user first).
    pub async fn cancel_order(&self, order_id: &str) -> CheckoutResult<()> {
        let _guard = self
            .lifecycle
            .begin_transition(order_id)
            .ok_or_else(|| CheckoutError::TransitionInFlight {
                order_id: order_id.to_string(),
            })?;

        self.repo.cancel(order_id).await?;

        if self.lifecycle.is_linked_to(order_id) {
            self.lifecycle.unlink();
            self.cart.with_cart_mut(|cart| cart.clear());
        }
        self.parked_orders.invalidate();
        self.events.publish(CheckoutEvent::OrderCancelled {
            order_id: order_id.to_string(),
        });
        info!(order_id = %order_id, "floating order cancelled");
        Ok(())
    }

    /// Lists parked orders, serving a fresh-enough cached copy when one
    /// exists. Every order mutation invalidates the cache.
    pub async fn list_parked_orders(&self) -> CheckoutResult<Vec<FloatingOrder>> {
        if let Some(orders) = self.parked_orders.get() {
            debug!("serving parked orders from cache");
            return Ok(orders);
        }
        let orders = self.repo.list().await?;
        self.parked_orders.put(orders.clone());
        Ok(orders)
    }

    // -------------------------------------------------------------------------
    // Auto-Park (debounced)
    // -------------------------------------------------------------------------

    /// Spawns the debounced auto-park when the cart just emptied while an
    /// order is linked. Outside a runtime (pure-sync host), the host calls
    /// [`Checkout::auto_park`] itself on `CartEmptied`.
    fn maybe_schedule_auto_park(&self) {
        let cart_empty = self.cart.with_cart(|cart| cart.is_empty());
        if !cart_empty || self.lifecycle.linked_order().is_none() {
            return;
        }

        let Some(this) = self.self_ref.upgrade() else {
            return;
        };
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(err) = this.auto_park().await {
                    warn!(error = %err, "debounced auto-park failed");
                }
            });
        }
    }

    /// The cart-emptied → in-progress transition, after the debounce window.
    ///
    /// Aborts silently when the cart refilled, the link changed, or another
    /// transition for the order is in flight (suppressed, not queued).
    ///
    /// ## Returns
    /// `true` when the order was parked.
    pub async fn auto_park(&self) -> CheckoutResult<bool> {
        let Some(order_id) = self.lifecycle.linked_order() else {
            return Ok(false);
        };

        tokio::time::sleep(self.config.empty_park_debounce()).await;

        // Re-check the world after the debounce: multi-step edits and
        // reloads must win over the timer.
        if !self.cart.with_cart(|cart| cart.is_empty()) {
            debug!(order_id = %order_id, "auto-park aborted: cart refilled");
            return Ok(false);
        }
        if !self.lifecycle.is_linked_to(&order_id) {
            debug!(order_id = %order_id, "auto-park aborted: link changed");
            return Ok(false);
        }
        let Some(_guard) = self.lifecycle.begin_transition(&order_id) else {
            debug!(order_id = %order_id, "auto-park suppressed: transition in flight");
            return Ok(false);
        };

        match reconcile::run(self.repo.as_ref(), &order_id, &[], &[]).await {
            Ok(_) => {
                self.lifecycle.unlink();
                self.parked_orders.invalidate();
                self.events.publish(CheckoutEvent::OrderParked {
                    order_id: order_id.clone(),
                    added_lines: 0,
                });
                info!(order_id = %order_id, "auto-parked after cart emptied");
                Ok(true)
            }
            Err(CheckoutError::Repository(RepositoryError::NotFound { .. }))
            | Err(CheckoutError::StaleOrder { .. }) => {
                // Order is gone; nothing to park.
                self.lifecycle.unlink();
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }

    // -------------------------------------------------------------------------
    // Settlement
    // -------------------------------------------------------------------------

    /// Completes the sale: session gate → tender validation → settlement
    /// submission → bill-out of the linked order.
    ///
    /// Validation failures never reach the network. A rejected submission
    /// preserves cart, rows, and linkage for retry.
    pub async fn complete_order(
        &self,
        rows: &[PaymentRow],
        options: TenderOptions,
        is_cash_method: impl Fn(&str) -> bool,
    ) -> CheckoutResult<CompletedSale> {
        let session = self.session_guard.ensure_open().await?;

        let items = self.cart.with_cart(|cart| cart.items());
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let (catalog, taxes) = {
            let catalog = self.discounts.lock().expect("catalog mutex poisoned").clone();
            let taxes = self.taxes.lock().expect("taxes mutex poisoned").clone();
            (catalog, taxes)
        };
        let totals = price_order(&items, &catalog, &taxes);

        let breakdown = allocate(rows, totals.grand_total, &is_cash_method);
        validate(rows, &breakdown, options.loyalty, options.customer_id.as_deref())?;
        let normalized = normalize_for_submission(rows, &breakdown, &is_cash_method);

        let order_id = self.lifecycle.linked_order();
        let context = SettlementContext {
            is_dine_in: options.is_dine_in,
            customer_id: options.customer_id.clone(),
            branch_id: self.branch_id(),
            tax_ids: taxes.iter().map(|t| t.id.clone()).collect(),
            floating_order_id: order_id.clone(),
            cash_register_session_id: Some(session.id.clone()),
        };
        let request = settlement::build_request(&items, &totals, &normalized, &breakdown, context)
            .map_err(CheckoutError::Payment)?;
        let primary_method = request.payment_method_id.clone();

        let receipt = match self.gateway.submit(request).await {
            Ok(receipt) => receipt,
            Err(source) => return Err(CheckoutError::SettlementRejected { source }),
        };

        // Settlement is posted; bill the parked order out. A stale link here
        // must not fail the sale — the transaction exists.
        if let Some(order_id) = &order_id {
            self.bill_out_linked(order_id, &primary_method, &options, &totals, &breakdown)
                .await;
        }

        self.lifecycle.unlink();
        self.cart.with_cart_mut(|cart| cart.clear());
        self.parked_orders.invalidate();
        self.events.publish(CheckoutEvent::OrderBilled {
            order_id,
            transaction_id: receipt.transaction_id.clone(),
        });
        info!(transaction_id = %receipt.transaction_id, total = %totals.grand_total, "sale completed");

        Ok(CompletedSale { receipt, breakdown })
    }

    /// Moves the linked order to `billed`, retrying once on a version
    /// conflict and downgrading stale references to a warning.
    async fn bill_out_linked(
        &self,
        order_id: &str,
        payment_method_id: &str,
        options: &TenderOptions,
        totals: &OrderTotals,
        breakdown: &TenderBreakdown,
    ) {
        let Some(_guard) = self.lifecycle.begin_transition(order_id) else {
            warn!(order_id = %order_id, "bill-out skipped: transition in flight");
            return;
        };

        let request = |version: i64| BillOutRequest {
            payment_method_id: payment_method_id.to_string(),
            is_dine_in: options.is_dine_in,
            paid_amount: breakdown.total_paid,
            change: Some(breakdown.change),
            due_amount: Some(totals.grand_total),
            expected_version: version,
        };

        let version = match self.repo.get(order_id).await {
            Ok(order) if order.is_terminal() => {
                warn!(order_id = %order_id, "linked order already terminal at bill-out");
                return;
            }
            Ok(order) => order.version,
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "linked order gone at bill-out; continuing unparked");
                return;
            }
        };

        let result = match self.repo.bill_out(order_id, request(version)).await {
            Err(RepositoryError::VersionConflict { current, .. }) => {
                self.repo.bill_out(order_id, request(current)).await
            }
            other => other,
        };

        match result {
            Ok(outcome) => {
                debug!(order_id = %order_id, transaction_id = %outcome.transaction_id, "order billed out");
            }
            Err(err) => {
                warn!(order_id = %order_id, error = %err, "bill-out failed after settlement; order left for cleanup");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Branch Switch (hard cancellation)
    // -------------------------------------------------------------------------

    /// Switches the branch context. Unconditionally clears the cart and the
    /// floating-order linkage; in-flight completions for the old link are
    /// ignored because their link-id comparison now fails. Caches for the
    /// old branch are dropped.
    pub fn switch_branch(&self, branch_id: impl Into<String>) {
        let branch_id = branch_id.into();

        // Unlink FIRST: any pending task re-checks the link before acting.
        self.lifecycle.unlink();
        self.cart.with_cart_mut(|cart| cart.clear());
        self.parked_orders.invalidate();
        *self.branch_id.lock().expect("branch mutex poisoned") = branch_id.clone();

        info!(branch_id = %branch_id, "branch switched; cart and linkage cleared");
        self.events
            .publish(CheckoutEvent::BranchChanged { branch_id });
    }

    // -------------------------------------------------------------------------
    // Internal
    // -------------------------------------------------------------------------

    /// Clears a stale link and builds the stale-order error.
    fn mark_stale(&self, order_id: &str) -> CheckoutError {
        if self.lifecycle.is_linked_to(order_id) {
            self.lifecycle.unlink();
        }
        self.parked_orders.invalidate();
        warn!(order_id = %order_id, "stale floating order reference cleared");
        CheckoutError::StaleOrder {
            order_id: order_id.to_string(),
        }
    }
}

impl std::fmt::Debug for Checkout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checkout")
            .field("linked_order", &self.linked_order())
            .field("branch_id", &self.branch_id())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
