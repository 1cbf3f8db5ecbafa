//! # atlas-checkout: Order Staging & Settlement for Atlas POS
//!
//! The subsystem that keeps a local, ephemeral working order (the cart)
//! consistent with a remotely persisted, shareable floating order, and turns
//! a priced, discounted, taxed order into a validated multi-method payment
//! with exact change.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Atlas POS Order Core                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 atlas-checkout (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐ ┌───────────┐ ┌───────────┐ ┌─────────────────┐  │   │
//! │  │  │ Checkout │ │ CartState │ │ reconcile │ │ OrderLifecycle  │  │   │
//! │  │  │ (driver) │ │ (staging) │ │ (deltas)  │ │ (guarded FSM)   │  │   │
//! │  │  └──────────┘ └───────────┘ └───────────┘ └─────────────────┘  │   │
//! │  │  ┌──────────────┐ ┌────────────┐ ┌──────────┐ ┌────────────┐  │   │
//! │  │  │ SessionGuard │ │ settlement │ │ EventBus │ │ TtlCache   │  │   │
//! │  │  │ (fail-closed)│ │ (payload)  │ │ (typed)  │ │ (explicit) │  │   │
//! │  │  └──────────────┘ └────────────┘ └──────────┘ └────────────┘  │   │
//! │  └───────────────────────────────┬─────────────────────────────────┘   │
//! │                                  │ traits                               │
//! │  ┌───────────────────────────────▼─────────────────────────────────┐   │
//! │  │  REMOTE COLLABORATORS (implemented by the host)                 │   │
//! │  │  FloatingOrderRepository · SettlementGateway · SessionProvider  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency Model
//! Remote operations are async and awaited; reconciliation add-item calls
//! are strictly sequential; at most one status-mutating transition is in
//! flight per order id (concurrent attempts are suppressed, not queued); a
//! branch switch is a hard cancellation that clears the cart and invalidates
//! the floating-order linkage regardless of pending calls.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod reconcile;
pub mod repository;
pub mod session;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartEntry, CartState};
pub use checkout::{Checkout, CompletedSale, TenderOptions};
pub use config::CheckoutConfig;
pub use error::{CheckoutError, CheckoutResult};
pub use events::{CheckoutEvent, EventBus};
pub use lifecycle::{OrderLifecycle, TransitionGuard};
pub use reconcile::ReconcileOutcome;
pub use repository::{
    AddItemRequest, BillOutOutcome, BillOutRequest, CreateOrderOutcome, CreateOrderRequest,
    FloatingOrderRepository, OrderPatch, RepositoryError, RepositoryResult, UpdateItemRequest,
};
pub use session::{SessionGateState, SessionGuard, SessionProvider};
pub use settlement::{
    SettlementGateway, SettlementItem, SettlementPayment, SettlementReceipt, SettlementRequest,
    SettlementStatus,
};
