//! In-memory collaborator doubles shared by the crate's tests.
//!
//! The mock repository keeps real state (orders, items, versions) and a call
//! log, so tests can assert both outcomes and remote call counts — the
//! reconciliation properties are about how FEW calls happen, not just the
//! final state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use atlas_core::{
    CashRegisterSession, FloatingOrder, LineItem, Money, OrderStatus, SessionStatus,
};

use crate::repository::{
    AddItemRequest, BillOutOutcome, BillOutRequest, CreateOrderOutcome, CreateOrderRequest,
    FloatingOrderRepository, OrderPatch, RepositoryError, RepositoryResult, UpdateItemRequest,
};
use crate::session::SessionProvider;
use crate::settlement::{SettlementGateway, SettlementReceipt, SettlementRequest};

/// Installs a test subscriber once so `RUST_LOG=debug cargo test` shows the
/// subsystem's tracing. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Builders
// =============================================================================

/// A line item with a fixed ¤10.00 unit price.
pub fn line(stock_id: &str, qty: i64, discounts: &[&str]) -> LineItem {
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

/// An open register session.
pub fn open_session() -> CashRegisterSession {
    CashRegisterSession {
        id: "sess-1".into(),
        cash_register_id: "reg-1".into(),
        status: SessionStatus::Open,
        opened_at: Utc::now(),
    }
}

// =============================================================================
// Mock Repository
// =============================================================================

/// Stateful in-memory floating-order service.
#[derive(Default)]
pub struct MockRepository {
    orders: Mutex<HashMap<String, FloatingOrder>>,
    taxes: Mutex<HashMap<String, Vec<String>>>,
    calls: Mutex<Vec<String>>,
    /// Successful add_item calls allowed before the next one fails.
    add_item_budget: Mutex<Option<usize>>,
    add_item_successes: AtomicUsize,
    next_reference: AtomicUsize,
}

impl MockRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an `active` order with the given items, version 1.
    pub fn seed_order(&self, id: &str, items: Vec<LineItem>) -> FloatingOrder {
        let order = FloatingOrder {
            id: id.to_string(),
            reference_number: format!("A-{:04}", self.next_reference.fetch_add(1, Ordering::SeqCst)),
            table_label: None,
            customer_id: None,
            status: OrderStatus::Active,
            items: items
                .into_iter()
                .map(|mut item| {
                    item.line_id = Some(Uuid::new_v4().to_string());
                    item
                })
                .collect(),
            subtotal: Money::zero(),
            grand_total: Money::zero(),
            total_discount: Money::zero(),
            total_tax: Money::zero(),
            notes: None,
            version: 1,
        };
        self.orders
            .lock()
            .unwrap()
            .insert(id.to_string(), order.clone());
        order
    }

    /// Snapshot of one order. Panics when absent (test helper).
    pub fn order(&self, id: &str) -> FloatingOrder {
        self.orders.lock().unwrap().get(id).expect("order seeded").clone()
    }

    pub fn set_status(&self, id: &str, status: OrderStatus) {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).expect("order seeded");
        order.status = status;
        order.version += 1;
    }

    /// Taxes attached to an order so far.
    pub fn taxes_for(&self, id: &str) -> Vec<String> {
        self.taxes.lock().unwrap().get(id).cloned().unwrap_or_default()
    }

    /// Lets `n` more add_item calls succeed, then fails them.
    pub fn fail_add_item_after(&self, n: usize) {
        *self.add_item_budget.lock().unwrap() = Some(n);
        self.add_item_successes.store(0, Ordering::SeqCst);
    }

    pub fn clear_failure(&self) {
        *self.add_item_budget.lock().unwrap() = None;
    }

    /// Number of recorded calls with the given name.
    pub fn calls_named(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl FloatingOrderRepository for MockRepository {
    async fn list(&self) -> RepositoryResult<Vec<FloatingOrder>> {
        self.record("list");
        let mut orders: Vec<FloatingOrder> = self.orders.lock().unwrap().values().cloned().collect();
        orders.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(orders)
    }

    async fn get(&self, id: &str) -> RepositoryResult<FloatingOrder> {
        self.record("get");
        self.orders
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "FloatingOrder".into(),
                id: id.to_string(),
            })
    }

    async fn create(&self, request: CreateOrderRequest) -> RepositoryResult<CreateOrderOutcome> {
        self.record("create");

        // Reuse an existing non-terminal order parked for the same table.
        if let Some(label) = &request.table_label {
            let orders = self.orders.lock().unwrap();
            if let Some(existing) = orders
                .values()
                .find(|o| o.table_label.as_ref() == Some(label) && !o.is_terminal())
            {
                return Ok(CreateOrderOutcome {
                    order: existing.clone(),
                    existing: true,
                });
            }
        }

        let id = Uuid::new_v4().to_string();
        let order = FloatingOrder {
            id: id.clone(),
            reference_number: format!("A-{:04}", self.next_reference.fetch_add(1, Ordering::SeqCst)),
            table_label: request.table_label,
            customer_id: request.customer_id,
            status: OrderStatus::Active,
            items: Vec::new(),
            subtotal: Money::zero(),
            grand_total: Money::zero(),
            total_discount: Money::zero(),
            total_tax: Money::zero(),
            notes: request.notes,
            version: 1,
        };
        self.orders.lock().unwrap().insert(id, order.clone());
        Ok(CreateOrderOutcome {
            order,
            existing: false,
        })
    }

    async fn update(&self, id: &str, patch: OrderPatch) -> RepositoryResult<FloatingOrder> {
        self.record("update");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;

        if order.version != patch.expected_version {
            return Err(RepositoryError::VersionConflict {
                id: id.to_string(),
                expected: patch.expected_version,
                current: order.version,
            });
        }

        if let Some(status) = patch.status {
            order.status = status;
        }
        if let Some(label) = patch.table_label {
            order.table_label = Some(label);
        }
        if let Some(customer) = patch.customer_id {
            order.customer_id = Some(customer);
        }
        if let Some(notes) = patch.notes {
            order.notes = Some(notes);
        }
        order.version += 1;
        Ok(order.clone())
    }

    async fn add_item(
        &self,
        id: &str,
        request: AddItemRequest,
    ) -> RepositoryResult<FloatingOrder> {
        self.record("add_item");

        if let Some(budget) = *self.add_item_budget.lock().unwrap() {
            if self.add_item_successes.load(Ordering::SeqCst) >= budget {
                return Err(RepositoryError::Transport("add_item refused".into()));
            }
        }

        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;
        if order.is_terminal() {
            return Err(RepositoryError::NotAddable {
                id: id.to_string(),
                status: order.status,
            });
        }

        let mut item = line(&request.stock_id, request.quantity, &[]);
        item.discount_ids = request.discounts;
        item.line_id = Some(Uuid::new_v4().to_string());
        order.items.push(item);
        order.version += 1;
        self.add_item_successes.fetch_add(1, Ordering::SeqCst);
        Ok(order.clone())
    }

    async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        request: UpdateItemRequest,
    ) -> RepositoryResult<FloatingOrder> {
        self.record("update_item");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;

        let item = order
            .items
            .iter_mut()
            .find(|i| i.line_id.as_deref() == Some(item_id))
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "OrderItem".into(),
                id: item_id.to_string(),
            })?;
        item.quantity = request.quantity;
        order.version += 1;
        Ok(order.clone())
    }

    async fn remove_item(&self, id: &str, item_id: &str) -> RepositoryResult<FloatingOrder> {
        self.record("remove_item");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;
        order.items.retain(|i| i.line_id.as_deref() != Some(item_id));
        order.version += 1;
        Ok(order.clone())
    }

    async fn add_taxes(&self, id: &str, tax_ids: &[String]) -> RepositoryResult<FloatingOrder> {
        self.record("add_taxes");
        let orders = self.orders.lock().unwrap();
        let order = orders.get(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;
        self.taxes
            .lock()
            .unwrap()
            .insert(id.to_string(), tax_ids.to_vec());
        Ok(order.clone())
    }

    async fn bill_out(
        &self,
        id: &str,
        request: BillOutRequest,
    ) -> RepositoryResult<BillOutOutcome> {
        self.record("bill_out");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;
        if order.is_terminal() {
            return Err(RepositoryError::NotAddable {
                id: id.to_string(),
                status: order.status,
            });
        }
        if order.version != request.expected_version {
            return Err(RepositoryError::VersionConflict {
                id: id.to_string(),
                expected: request.expected_version,
                current: order.version,
            });
        }

        order.status = OrderStatus::Billed;
        order.version += 1;
        Ok(BillOutOutcome {
            transaction_id: Uuid::new_v4().to_string(),
            order: order.clone(),
        })
    }

    async fn cancel(&self, id: &str) -> RepositoryResult<()> {
        self.record("cancel");
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(id).ok_or_else(|| RepositoryError::NotFound {
            entity: "FloatingOrder".into(),
            id: id.to_string(),
        })?;
        order.status = OrderStatus::Cancelled;
        order.version += 1;
        Ok(())
    }
}

// =============================================================================
// Mock Settlement Gateway
// =============================================================================

/// Records submissions; can be told to reject.
#[derive(Default)]
pub struct MockGateway {
    submissions: Mutex<Vec<SettlementRequest>>,
    reject: Mutex<bool>,
    counter: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reject(&self, reject: bool) {
        *self.reject.lock().unwrap() = reject;
    }

    pub fn submissions(&self) -> Vec<SettlementRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SettlementGateway for MockGateway {
    async fn submit(&self, request: SettlementRequest) -> RepositoryResult<SettlementReceipt> {
        if *self.reject.lock().unwrap() {
            return Err(RepositoryError::Transport("settlement rejected".into()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.submissions.lock().unwrap().push(request);
        Ok(SettlementReceipt {
            transaction_id: format!("txn-{n}"),
            receipt_number: format!("R-{n:04}"),
        })
    }
}

// =============================================================================
// Mock Session Provider
// =============================================================================

/// Fixed-answer session source.
pub struct MockSessions {
    response: Mutex<RepositoryResult<Option<CashRegisterSession>>>,
}

impl MockSessions {
    pub fn open() -> Self {
        MockSessions {
            response: Mutex::new(Ok(Some(open_session()))),
        }
    }

    pub fn none() -> Self {
        MockSessions {
            response: Mutex::new(Ok(None)),
        }
    }

    pub fn failing() -> Self {
        MockSessions {
            response: Mutex::new(Err(RepositoryError::Transport("session query failed".into()))),
        }
    }

    pub fn set(&self, response: RepositoryResult<Option<CashRegisterSession>>) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl SessionProvider for MockSessions {
    async fn current_session(&self) -> RepositoryResult<Option<CashRegisterSession>> {
        self.response.lock().unwrap().clone()
    }
}
