//! # TTL Caches
//!
//! Explicit cache abstractions owning their TTL and invalidation, replacing
//! ad hoc module-level caches. Callers depend on these types, not on shared
//! mutable globals; invalidation is a method, not a free function someone has
//! to remember to call from the right module.
//!
//! Both caches use `std::sync::Mutex` — no lock is ever held across an await.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::{Duration, Instant};

// =============================================================================
// Single-Slot Cache
// =============================================================================

/// A single cached value with a freshness window.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use atlas_checkout::cache::TtlCache;
///
/// let cache: TtlCache<Vec<String>> = TtlCache::new(Duration::from_secs(30));
/// assert!(cache.get().is_none());
/// cache.put(vec!["order-1".to_string()]);
/// assert_eq!(cache.get().unwrap().len(), 1);
/// cache.invalidate();
/// assert!(cache.get().is_none());
/// ```
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl: Duration,
    slot: Mutex<Option<(Instant, T)>>,
}

impl<T: Clone> TtlCache<T> {
    /// Creates an empty cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        TtlCache {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached value if present and still fresh.
    pub fn get(&self) -> Option<T> {
        let slot = self.slot.lock().expect("cache mutex poisoned");
        match slot.as_ref() {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Stores a value, stamping it fresh now.
    pub fn put(&self, value: T) {
        let mut slot = self.slot.lock().expect("cache mutex poisoned");
        *slot = Some((Instant::now(), value));
    }

    /// Drops the cached value immediately.
    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().expect("cache mutex poisoned");
        *slot = None;
    }
}

// =============================================================================
// Scope-Keyed Cache
// =============================================================================

/// A cache of values keyed by scope (branch id, list kind, …) with per-entry
/// freshness and per-scope invalidation.
#[derive(Debug)]
pub struct ScopedCache<K, T> {
    ttl: Duration,
    map: Mutex<HashMap<K, (Instant, T)>>,
}

impl<K: Eq + Hash, T: Clone> ScopedCache<K, T> {
    /// Creates an empty cache with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        ScopedCache {
            ttl,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the value cached under `scope` if still fresh.
    pub fn get(&self, scope: &K) -> Option<T> {
        let map = self.map.lock().expect("cache mutex poisoned");
        match map.get(scope) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Stores a value under `scope`, stamping it fresh now.
    pub fn put(&self, scope: K, value: T) {
        let mut map = self.map.lock().expect("cache mutex poisoned");
        map.insert(scope, (Instant::now(), value));
    }

    /// Drops the entry cached under `scope`.
    pub fn invalidate(&self, scope: &K) {
        let mut map = self.map.lock().expect("cache mutex poisoned");
        map.remove(scope);
    }

    /// Drops every entry.
    pub fn invalidate_all(&self) {
        let mut map = self.map.lock().expect("cache mutex poisoned");
        map.clear();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
