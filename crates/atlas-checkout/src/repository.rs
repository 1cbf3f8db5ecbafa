//! # Floating Order Repository
//!
//! The remote parked-order store, as a trait the host implements against its
//! transport of choice. Every operation takes a typed request struct with its
//! required and optional fields fixed at compile time — malformed payloads
//! are a type error here, not a runtime surprise on the wire.
//!
//! ## Conditional Writes
//! The floating order is shared across terminals. Status-changing writes
//! (`update`, `bill_out`) carry the version the caller last saw; the service
//! rejects a stale write with [`RepositoryError::VersionConflict`], and the
//! caller refetches and retries. Item-level appends (`add_item`,
//! `add_taxes`) are unconditional server-side merges, which keeps
//! reconciliation idempotent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use atlas_core::{FloatingOrder, Money, OrderStatus};

// =============================================================================
// Repository Error
// =============================================================================

/// Failures reported by the floating-order service.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The entity does not exist (deleted, billed out elsewhere, or never
    /// created).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The order exists but its status no longer accepts item mutations.
    #[error("Order {id} is {status}, items can no longer be added")]
    NotAddable { id: String, status: OrderStatus },

    /// A conditional write carried a stale version. Refetch and retry.
    #[error("Stale write on order {id}: expected version {expected}, current {current}")]
    VersionConflict {
        id: String,
        expected: i64,
        current: i64,
    },

    /// Network or service failure.
    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Payload for creating (or reusing) a parked order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub table_label: Option<String>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
}

/// Result of a create call.
///
/// `existing` is true when the service handed back an already-active order
/// for the same table instead of creating a fresh one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderOutcome {
    pub order: FloatingOrder,
    pub existing: bool,
}

/// Conditional metadata/status update. `None` fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub table_label: Option<String>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,

    /// Version the caller last saw; the write is rejected when stale.
    pub expected_version: i64,
}

impl OrderPatch {
    /// A patch that only moves the status.
    pub fn status_only(status: OrderStatus, expected_version: i64) -> Self {
        OrderPatch {
            status: Some(status),
            table_label: None,
            customer_id: None,
            notes: None,
            expected_version,
        }
    }
}

/// Payload for appending quantity to an order under a fungible key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub stock_id: String,
    pub quantity: i64,
    pub discounts: Vec<String>,
}

/// Payload for an explicit per-item quantity edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

/// Payload for billing an order out after settlement succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillOutRequest {
    pub payment_method_id: String,
    pub is_dine_in: bool,
    pub paid_amount: Money,
    pub change: Option<Money>,
    pub due_amount: Option<Money>,

    /// Version the caller last saw; the write is rejected when stale.
    pub expected_version: i64,
}

/// Result of a bill-out call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillOutOutcome {
    pub transaction_id: String,
    pub order: FloatingOrder,
}

// =============================================================================
// Repository Trait
// =============================================================================

/// Remote CRUD for parked orders.
///
/// All calls are request/response; ordering across calls is the caller's
/// responsibility (the reconciliation engine awaits each add before the
/// next).
#[async_trait]
pub trait FloatingOrderRepository: Send + Sync {
    /// Lists parked orders visible to this terminal's branch.
    async fn list(&self) -> RepositoryResult<Vec<FloatingOrder>>;

    /// Fetches one order by id.
    async fn get(&self, id: &str) -> RepositoryResult<FloatingOrder>;

    /// Creates a parked order, or returns an existing active order for the
    /// same table (signaled by `existing`).
    async fn create(&self, request: CreateOrderRequest) -> RepositoryResult<CreateOrderOutcome>;

    /// Conditionally updates metadata and/or status.
    async fn update(&self, id: &str, patch: OrderPatch) -> RepositoryResult<FloatingOrder>;

    /// Appends quantity under a fungible key. Unconditional merge.
    async fn add_item(&self, id: &str, request: AddItemRequest)
        -> RepositoryResult<FloatingOrder>;

    /// Sets the quantity of one existing line. Explicit user action; the
    /// reconciliation engine never calls this.
    async fn update_item(
        &self,
        id: &str,
        item_id: &str,
        request: UpdateItemRequest,
    ) -> RepositoryResult<FloatingOrder>;

    /// Removes one existing line. Explicit user action.
    async fn remove_item(&self, id: &str, item_id: &str) -> RepositoryResult<FloatingOrder>;

    /// Attaches the active tax set. Idempotent; safe to call unchanged.
    async fn add_taxes(&self, id: &str, tax_ids: &[String]) -> RepositoryResult<FloatingOrder>;

    /// Marks the order billed after a successful settlement.
    async fn bill_out(&self, id: &str, request: BillOutRequest)
        -> RepositoryResult<BillOutOutcome>;

    /// Voids the order. Terminal.
    async fn cancel(&self, id: &str) -> RepositoryResult<()>;
}

// =============================================================================
// Unit Tests
// =============================================================================
