//! # Order Lifecycle
//!
//! Tracks which floating order is linked to this terminal's cart and
//! enforces the single-transition invariant per order id.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Floating Order Lifecycle                              │
//! │                                                                         │
//! │   (none) ──create/load──► active ◄──reconcile (park)── in-progress     │
//! │                             │                               ▲           │
//! │                             │ cart emptied (debounced)      │           │
//! │                             └───────────────────────────────┘           │
//! │                                                                         │
//! │   active | in-progress ──settlement ok──► billed     (terminal)        │
//! │   active | in-progress ──explicit cancel─► cancelled (terminal)        │
//! │                                                                         │
//! │   GUARD: at most ONE status-mutating transition in flight per order    │
//! │   id. A second attempt while one is pending is SUPPRESSED, not queued  │
//! │   (prevents a cancel racing a debounced auto-park).                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guard is an explicit in-flight marker keyed by order id — held as an
//! RAII token, released on drop — not a timer race.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::debug;

// =============================================================================
// Transition Guard
// =============================================================================

/// RAII token marking a status transition in flight for one order id.
///
/// Dropping the token clears the marker, including on error paths.
#[derive(Debug)]
pub struct TransitionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
    order_id: String,
}

impl TransitionGuard {
    /// The order id this token holds.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        let mut set = self.in_flight.lock().expect("in-flight mutex poisoned");
        set.remove(&self.order_id);
        debug!(order_id = %self.order_id, "transition finished");
    }
}

// =============================================================================
// Order Lifecycle
// =============================================================================

/// Linked-order tracking plus the per-order in-flight marker set.
#[derive(Debug, Default)]
pub struct OrderLifecycle {
    /// The one floating order currently linked to this terminal's cart.
    linked: Mutex<Option<String>>,

    /// Order ids with a status-mutating transition currently pending.
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl OrderLifecycle {
    /// Creates an unlinked lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Linkage
    // -------------------------------------------------------------------------

    /// The currently linked floating order id, if any.
    pub fn linked_order(&self) -> Option<String> {
        self.linked.lock().expect("link mutex poisoned").clone()
    }

    /// Links an order, replacing any previous link.
    ///
    /// Exactly one order may be linked at a time; results of calls still in
    /// flight for a replaced link must be ignored by comparing ids.
    pub fn link(&self, order_id: impl Into<String>) {
        let order_id = order_id.into();
        debug!(order_id = %order_id, "linking floating order");
        *self.linked.lock().expect("link mutex poisoned") = Some(order_id);
    }

    /// Drops the link, returning the previously linked id.
    pub fn unlink(&self) -> Option<String> {
        let previous = self.linked.lock().expect("link mutex poisoned").take();
        if let Some(id) = &previous {
            debug!(order_id = %id, "unlinked floating order");
        }
        previous
    }

    /// Checks whether `order_id` is the current link.
    ///
    /// In-flight results must pass this check before being applied: a branch
    /// switch or reload invalidates stale completions.
    pub fn is_linked_to(&self, order_id: &str) -> bool {
        self.linked
            .lock()
            .expect("link mutex poisoned")
            .as_deref()
            .map(|linked| linked == order_id)
            .unwrap_or(false)
    }

    // -------------------------------------------------------------------------
    // Transition Guard
    // -------------------------------------------------------------------------

    /// Attempts to begin a status-mutating transition for `order_id`.
    ///
    /// Returns `None` when another transition for the same id is pending —
    /// the caller must drop its attempt (suppressed, never queued).
    pub fn begin_transition(&self, order_id: &str) -> Option<TransitionGuard> {
        let mut set = self.in_flight.lock().expect("in-flight mutex poisoned");
        if !set.insert(order_id.to_string()) {
            debug!(order_id = %order_id, "transition already in flight; suppressing");
            return None;
        }
        debug!(order_id = %order_id, "transition begun");
        Some(TransitionGuard {
            in_flight: Arc::clone(&self.in_flight),
            order_id: order_id.to_string(),
        })
    }

    /// Checks whether a transition is pending for `order_id` (diagnostics).
    pub fn transition_in_flight(&self, order_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight mutex poisoned")
            .contains(order_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_replace_unlink() {
        let lifecycle = OrderLifecycle::new();
        assert_eq!(lifecycle.linked_order(), None);

        lifecycle.link("o1");
        assert!(lifecycle.is_linked_to("o1"));

        lifecycle.link("o2");
        assert!(!lifecycle.is_linked_to("o1"));
        assert!(lifecycle.is_linked_to("o2"));

        assert_eq!(lifecycle.unlink(), Some("o2".to_string()));
        assert_eq!(lifecycle.linked_order(), None);
    }

    #[test]
    fn test_second_transition_is_suppressed() {
        let lifecycle = OrderLifecycle::new();

        let guard = lifecycle.begin_transition("o1").expect("first begins");
        assert!(lifecycle.begin_transition("o1").is_none());
        assert!(lifecycle.transition_in_flight("o1"));

        drop(guard);
        assert!(!lifecycle.transition_in_flight("o1"));
        assert!(lifecycle.begin_transition("o1").is_some());
    }

    #[test]
    fn test_guard_is_per_order_id() {
        let lifecycle = OrderLifecycle::new();

        let _a = lifecycle.begin_transition("o1").expect("o1 begins");
        // A different order id is unaffected.
        assert!(lifecycle.begin_transition("o2").is_some());
    }

    #[test]
    fn test_guard_releases_on_drop_in_error_path() {
        let lifecycle = OrderLifecycle::new();

        {
            let _guard = lifecycle.begin_transition("o1").unwrap();
            // Simulated failure: the token goes out of scope with the error.
        }
        assert!(!lifecycle.transition_in_flight("o1"));
    }
}
