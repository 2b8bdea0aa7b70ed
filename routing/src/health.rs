//! Failure memory for gateways: a short-lived, in-memory denylist.
//!
//! The tracker only exists to avoid re-routing to a gateway that just
//! failed within the same session. It is owned by the router and injected
//! where needed; nothing here persists across process restarts.

use arvex_types::Timestamp;
use std::collections::HashMap;

/// How long a recorded failure keeps a gateway out of the healthy set.
const FAILURE_WINDOW_SECS: u64 = 300;

/// Tracks recently failing gateway URLs.
///
/// Policy: never let filtering produce an empty set. Routing to a known-bad
/// gateway beats routing to nothing, so when every candidate is marked
/// unhealthy the tracker clears itself and stops filtering.
#[derive(Debug, Default)]
pub struct GatewayHealthTracker {
    /// Most recent failure per gateway URL.
    failures: HashMap<String, Timestamp>,
}

impl GatewayHealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure observed for `url` at `now`.
    pub fn record_failure(&mut self, url: &str, now: Timestamp) {
        self.failures.insert(url.to_string(), now);
    }

    /// Whether `url` has no unexpired failure on record.
    pub fn is_healthy(&self, url: &str, now: Timestamp) -> bool {
        match self.failures.get(url) {
            Some(failed_at) => failed_at.has_expired(FAILURE_WINDOW_SECS, now),
            None => true,
        }
    }

    /// Remove gateways with a recent failure from `urls`.
    ///
    /// If filtering would empty a non-empty input, the failure memory is
    /// cleared entirely and the input is returned unfiltered.
    pub fn filter_healthy(&mut self, urls: Vec<String>, now: Timestamp) -> Vec<String> {
        self.prune(now);

        let healthy: Vec<String> = urls
            .iter()
            .filter(|url| self.is_healthy(url, now))
            .cloned()
            .collect();

        if healthy.is_empty() && !urls.is_empty() {
            tracing::warn!(
                candidates = urls.len(),
                "all candidate gateways marked unhealthy; clearing failure memory"
            );
            self.clear();
            return urls;
        }

        healthy
    }

    /// Forget all recorded failures.
    pub fn clear(&mut self) {
        self.failures.clear();
    }

    /// Number of gateways currently on record (expired or not).
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Drop entries whose failure window has passed.
    fn prune(&mut self, now: Timestamp) {
        self.failures
            .retain(|_, failed_at| !failed_at.has_expired(FAILURE_WINDOW_SECS, now));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
