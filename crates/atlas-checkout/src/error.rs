//! # Checkout Error Types
//!
//! Error types for the staging and settlement workflow.
//!
//! ## Error Taxonomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │ Stale Reference │  │  Partial Reconcile      │ │
//! │  │  (local, no     │  │                 │  │                         │ │
//! │  │   network)      │  │  StaleOrder     │  │  PartialReconciliation  │ │
//! │  │  Core, Payment  │  │                 │  │  (retryable)            │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Settlement    │  │  Session Gate   │  │  Concurrency            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Settlement-    │  │  SessionRequired│  │  TransitionInFlight     │ │
//! │  │  Rejected       │  │  (fail-closed)  │  │  (suppressed, not       │ │
//! │  │  (retryable)    │  │                 │  │   queued)               │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation errors block the action with no partial state change.
//! Stale-reference errors clear the local link and leave the cart usable.
//! Partial-reconciliation and settlement failures preserve local state so a
//! retry needs no re-entry.

use thiserror::Error;

use atlas_core::{CoreError, PaymentError};

use crate::repository::RepositoryError;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// Checkout error type covering the staging and settlement workflow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Local Validation (no network, no partial state change)
    // =========================================================================
    /// Business rule violation from the core layer.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Tender validation failure.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    // =========================================================================
    // Remote Collaborator Failures
    // =========================================================================
    /// A repository call failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The linked floating order no longer exists remotely, or is no longer
    /// in a loadable/addable status. The local link has been cleared; the
    /// cart remains usable for an unparked checkout.
    #[error("Floating order {order_id} is gone or no longer editable; link cleared")]
    StaleOrder { order_id: String },

    /// One add-item call of a multi-delta reconciliation failed. Applied
    /// deltas are NOT rolled back; re-running reconciliation recomputes the
    /// remaining deltas from current remote state.
    #[error(
        "Reconciliation of order {order_id} applied {applied} of {total} deltas before failing; retry to finish"
    )]
    PartialReconciliation {
        order_id: String,
        applied: usize,
        total: usize,
        #[source]
        source: RepositoryError,
    },

    /// Settlement submission was rejected. Payment is not complete; the cart
    /// and the floating-order linkage are preserved for retry.
    #[error("Settlement submission rejected; entered payments are preserved for retry")]
    SettlementRejected {
        #[source]
        source: RepositoryError,
    },

    // =========================================================================
    // Concurrency Guards
    // =========================================================================
    /// A status-mutating transition is already in flight for this order id.
    /// The attempt is suppressed, not queued.
    #[error("A transition is already in flight for order {order_id}")]
    TransitionInFlight { order_id: String },

    // =========================================================================
    // Preconditions
    // =========================================================================
    /// No open cash register session; the sales surface is gated.
    #[error("No open cash register session; open one before entering sales")]
    SessionRequired,

    /// The operation needs a linked floating order and none is linked.
    #[error("No floating order is linked to this cart")]
    NoLinkedOrder,

    /// Settlement was requested for an empty cart.
    #[error("Cart is empty")]
    EmptyCart,
}

impl CheckoutError {
    /// True for failures a plain retry can resolve without re-entering data.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::PartialReconciliation { .. }
                | CheckoutError::SettlementRejected { .. }
                | CheckoutError::Repository(RepositoryError::Transport(_))
                | CheckoutError::Repository(RepositoryError::VersionConflict { .. })
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let partial = CheckoutError::PartialReconciliation {
            order_id: "o1".into(),
            applied: 1,
            total: 3,
            source: RepositoryError::Transport("timeout".into()),
        };
        assert!(partial.is_retryable());

        let rejected = CheckoutError::SettlementRejected {
            source: RepositoryError::Transport("500".into()),
        };
        assert!(rejected.is_retryable());

        assert!(!CheckoutError::SessionRequired.is_retryable());
        assert!(!CheckoutError::NoLinkedOrder.is_retryable());
    }

    #[test]
    fn test_messages_are_actionable() {
        let err = CheckoutError::StaleOrder {
            order_id: "o9".into(),
        };
        assert!(err.to_string().contains("o9"));

        let err = CheckoutError::PartialReconciliation {
            order_id: "o1".into(),
            applied: 2,
            total: 5,
            source: RepositoryError::Transport("reset".into()),
        };
        assert!(err.to_string().contains("2 of 5"));
    }
}
