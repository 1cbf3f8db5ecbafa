//! # Checkout Events
//!
//! Typed pub-sub for cross-component signaling.
//!
//! Subscribers receive a statically known `CheckoutEvent` enum over a
//! `tokio::sync::broadcast` channel — no ambient DOM-style custom events, no
//! stringly-typed topics. The UI layer subscribes to re-render; internal
//! components subscribe where they need to observe state they don't own.
//!
//! Broadcast semantics: every subscriber sees every event published after it
//! subscribed; a lagging subscriber loses the oldest buffered events and is
//! told how many it missed.

use tokio::sync::broadcast;
use tracing::trace;

// =============================================================================
// Event Type
// =============================================================================

/// Everything the checkout subsystem announces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    /// The cart's contents changed (add, quantity edit, remove, replace).
    CartChanged {
        entry_count: usize,
        total_quantity: i64,
    },

    /// The cart transitioned from non-empty to empty.
    CartEmptied,

    /// A floating order was linked to this cart (created or loaded).
    OrderLinked { order_id: String },

    /// The cart was parked against its linked order.
    OrderParked {
        order_id: String,
        /// Number of add-item deltas applied; zero for a no-op park.
        added_lines: usize,
    },

    /// A settlement completed and the order (if any) was billed out.
    OrderBilled {
        order_id: Option<String>,
        transaction_id: String,
    },

    /// A floating order was cancelled.
    OrderCancelled { order_id: String },

    /// The session gate opened or closed.
    SessionGateChanged { open: bool },

    /// The terminal switched branch context. Hard cancellation point.
    BranchChanged { branch_id: String },

    /// A stock's availability changed (external signal relayed to the UI).
    StockUpdated { stock_id: String },
}

// =============================================================================
// Event Bus
// =============================================================================

/// Broadcast bus for [`CheckoutEvent`].
///
/// Cloneable handle; all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CheckoutEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// Subscribes to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckoutEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event: CheckoutEvent) {
        trace!(?event, "publishing checkout event");
        let _ = self.tx.send(event);
    }

    /// Number of live subscribers (diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(crate::config::CheckoutConfig::default().event_capacity)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
