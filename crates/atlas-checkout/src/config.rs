//! # Checkout Configuration
//!
//! Tunables for the staging subsystem. The host deserializes this from its
//! own config file (TOML) or constructs it in code; everything has a default.
//!
//! ## Configuration File Format
//! ```toml
//! # checkout section of the host config
//! [checkout]
//! empty_park_debounce_ms = 500
//! orders_cache_ttl_secs = 30
//! event_capacity = 64
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// =============================================================================
// Defaults
// =============================================================================

/// Debounce before an emptied cart auto-parks its linked order.
///
/// Absorbs multi-step edits (remove last line, immediately add another)
/// without flickering the remote status. The per-order in-flight guard, not
/// this timer, enforces the single-transition invariant.
const DEFAULT_EMPTY_PARK_DEBOUNCE_MS: u64 = 500;

/// How long a fetched parked-orders list stays fresh.
const DEFAULT_ORDERS_CACHE_TTL_SECS: u64 = 30;

/// Broadcast buffer size for checkout events.
const DEFAULT_EVENT_CAPACITY: usize = 64;

// =============================================================================
// Config
// =============================================================================

/// Configuration for the checkout subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct CheckoutConfig {
    /// Milliseconds to wait after the cart empties before auto-parking.
    pub empty_park_debounce_ms: u64,

    /// Seconds a cached parked-orders list stays fresh.
    pub orders_cache_ttl_secs: u64,

    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl CheckoutConfig {
    /// The auto-park debounce as a `Duration`.
    pub fn empty_park_debounce(&self) -> Duration {
        Duration::from_millis(self.empty_park_debounce_ms)
    }

    /// The parked-orders cache TTL as a `Duration`.
    pub fn orders_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.orders_cache_ttl_secs)
    }
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        CheckoutConfig {
            empty_park_debounce_ms: DEFAULT_EMPTY_PARK_DEBOUNCE_MS,
            orders_cache_ttl_secs: DEFAULT_ORDERS_CACHE_TTL_SECS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
