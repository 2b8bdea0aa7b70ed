//! Browse session state: status, phase, and accumulated verification stats.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many recent-activity entries the stats keep.
const RECENT_ACTIVITY_CAPACITY: usize = 8;

/// Overall outcome of the current search.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStatus {
    #[default]
    Idle,
    Verifying,
    /// Every resource verified.
    Verified,
    /// Some resources verified, some failed.
    Partial,
    Failed,
}

/// Progressive-disclosure phase, orthogonal to [`SearchStatus`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BrowsePhase {
    #[default]
    Resolving,
    FetchingManifest,
    Verifying,
    Complete,
}

/// Counters accumulated from the event stream, reset on every new search.
///
/// Invariant: `verified + failed <= total` at every point in a run, and
/// `total` is non-decreasing within a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub total: usize,
    pub verified: usize,
    pub failed: usize,
    pub failed_resources: Vec<String>,
    /// Last few verified/failed paths, newest last.
    pub recent: VecDeque<String>,
}

impl VerificationStats {
    /// Zero everything, keeping no history from the previous run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a run with a provisional total (at least 1).
    pub fn start(&mut self, total: usize) {
        self.reset();
        self.total = total.max(1);
    }

    /// The manifest resolved to a concrete resource count.
    pub fn set_total(&mut self, total: usize) {
        // Totals only grow within a run.
        self.total = self.total.max(total.max(1));
    }

    pub fn record_progress(&mut self, path: &str, verified: usize) {
        self.verified = verified.min(self.total.saturating_sub(self.failed));
        self.push_recent(format!("verified {path}"));
    }

    pub fn record_resource_failure(&mut self, path: &str) {
        if self.verified + self.failed < self.total {
            self.failed += 1;
        }
        self.failed_resources.push(path.to_string());
        self.push_recent(format!("failed {path}"));
    }

    /// Final counts from the completion event.
    pub fn finalize(&mut self, verified: usize, failed: usize) {
        self.total = self.total.max(verified + failed);
        self.verified = verified;
        self.failed = failed;
    }

    fn push_recent(&mut self, entry: String) {
        if self.recent.len() >= RECENT_ACTIVITY_CAPACITY {
            self.recent.pop_front();
        }
        self.recent.push_back(entry);
    }
}
