//! Time-boxed single-value caches.
//!
//! Two caches with different lifetimes sit in the routing path: the gateway
//! pool (discovery is a network round-trip, TTL 180 s) and the fastest-probe
//! winner (probing contacts every candidate, TTL 300 s). Both use the same
//! small cache type with an explicit clock.

use arvex_types::Timestamp;

/// TTL for the discovered gateway pool.
pub const POOL_CACHE_TTL_SECS: u64 = 180;

/// TTL for the fastest-probe winner.
pub const PROBE_CACHE_TTL_SECS: u64 = 300;

/// A single cached value with a fixed time-to-live.
#[derive(Debug)]
pub struct TtlCache<T> {
    ttl_secs: u64,
    entry: Option<(T, Timestamp)>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl_secs,
            entry: None,
        }
    }

    /// Return the cached value if it was stored within the TTL window.
    pub fn get(&self, now: Timestamp) -> Option<T> {
        match &self.entry {
            Some((value, stored_at)) if !stored_at.has_expired(self.ttl_secs, now) => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Store a value, replacing any previous entry.
    pub fn put(&mut self, value: T, now: Timestamp) {
        self.entry = Some((value, now));
    }

    /// Drop the cached value.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
