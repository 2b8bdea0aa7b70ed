//! The foreground verification state machine.
//!
//! Transitions are driven exclusively by worker events; the session never
//! polls. Every event envelope carries the generation of the search that
//! produced it, and envelopes from superseded generations are dropped, so
//! a slow event from an aborted run can never contaminate fresh state.

use crate::state::{BrowsePhase, SearchStatus, VerificationStats};
use arvex_messages::{EventEnvelope, VerificationEvent};
use arvex_types::url::resolved_url;
use arvex_types::{Identifier, Timestamp};

/// State of one browse session, owned by the foreground.
#[derive(Clone, Debug, Default)]
pub struct BrowseSession {
    generation: u64,
    identifier: Option<Identifier>,
    status: SearchStatus,
    phase: BrowsePhase,
    stats: VerificationStats,
    gateway: Option<String>,
    resolved_url: Option<String>,
    error: Option<String>,
    started_at: Option<Timestamp>,
    finished_at: Option<Timestamp>,
    single_file: bool,
    /// Verification was skipped (disabled or worker unavailable); content
    /// is served over the direct, unverified path.
    unverified_path: bool,
    strict: bool,
    /// Explicit user override of the strict-mode gate.
    bypass: bool,
}

impl BrowseSession {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            ..Self::default()
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    pub fn status(&self) -> SearchStatus {
        self.status
    }

    pub fn phase(&self) -> BrowsePhase {
        self.phase
    }

    pub fn stats(&self) -> &VerificationStats {
        &self.stats
    }

    pub fn gateway(&self) -> Option<&str> {
        self.gateway.as_deref()
    }

    pub fn resolved_url(&self) -> Option<&str> {
        self.resolved_url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_single_file(&self) -> bool {
        self.single_file
    }

    pub fn is_unverified_path(&self) -> bool {
        self.unverified_path
    }

    /// Seconds the finished run took, when both endpoints are known.
    pub fn duration_secs(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some(start.elapsed_since(end)),
            _ => None,
        }
    }

    /// Whether the run reached a terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(
            self.status,
            SearchStatus::Verified | SearchStatus::Partial | SearchStatus::Failed
        )
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Reset all per-search state and bump the generation. Returns the new
    /// generation, which must be attached to the worker request so events
    /// from older runs are recognizably stale.
    pub fn begin_search(&mut self, identifier: Identifier, now: Timestamp) -> u64 {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            identifier: Some(identifier),
            status: SearchStatus::Verifying,
            phase: BrowsePhase::Resolving,
            started_at: Some(now),
            strict: self.strict,
            ..Self::default()
        };
        self.generation
    }

    /// Settings changed mid-search: wipe everything back to idle. The
    /// caller decides whether to start a fresh run.
    pub fn reset_for_settings_change(&mut self, strict: bool) {
        let generation = self.generation + 1;
        *self = Self {
            generation,
            strict,
            ..Self::default()
        };
    }

    /// The worker is unavailable or verification is disabled: record the
    /// routed gateway and resolved URL, skip verification entirely.
    pub fn mark_unverified(&mut self, gateway: &str) {
        self.gateway = Some(gateway.to_string());
        if let Some(identifier) = &self.identifier {
            self.resolved_url = Some(resolved_url(identifier, gateway));
        }
        self.unverified_path = true;
        self.status = SearchStatus::Idle;
        self.phase = BrowsePhase::Complete;
    }

    /// Record a resolution failure that ended the search.
    pub fn fail(&mut self, error: &str, now: Timestamp) {
        self.error = Some(error.to_string());
        self.status = SearchStatus::Failed;
        self.phase = BrowsePhase::Complete;
        self.finished_at = Some(now);
    }

    // -- Event application ---------------------------------------------------

    /// Apply a worker event. Returns `false` when the envelope belongs to a
    /// superseded generation and was ignored.
    pub fn apply_event(&mut self, envelope: &EventEnvelope, now: Timestamp) -> bool {
        if envelope.generation != self.generation {
            tracing::debug!(
                stale = envelope.generation,
                current = self.generation,
                "dropping stale verification event"
            );
            return false;
        }

        match &envelope.event {
            VerificationEvent::RoutingGateway { gateway } => {
                self.gateway = Some(gateway.clone());
                if let Some(identifier) = &self.identifier {
                    self.resolved_url = Some(resolved_url(identifier, gateway));
                }
                self.phase = BrowsePhase::FetchingManifest;
            }
            VerificationEvent::VerificationStarted { total } => {
                self.stats.start(*total);
                self.started_at = Some(now);
                self.status = SearchStatus::Verifying;
            }
            VerificationEvent::ManifestLoaded { total, single_file } => {
                self.stats.set_total(*total);
                self.single_file = *single_file;
                self.phase = BrowsePhase::Verifying;
            }
            VerificationEvent::VerificationProgress { path, verified, .. } => {
                self.stats.record_progress(path, *verified);
            }
            VerificationEvent::VerificationComplete { verified, failed } => {
                self.stats.finalize(*verified, *failed);
                self.phase = BrowsePhase::Complete;
                self.finished_at = Some(now);
                self.status = if *failed == 0 {
                    SearchStatus::Verified
                } else if *verified > 0 {
                    SearchStatus::Partial
                } else {
                    SearchStatus::Failed
                };
            }
            VerificationEvent::VerificationFailed { path, error } => match path {
                Some(path) => {
                    self.stats.record_resource_failure(path);
                }
                None => {
                    self.fail(error, now);
                }
            },
        }
        true
    }

    // -- Strict-mode gate ----------------------------------------------------

    /// Whether content display is blocked behind the strict-verification
    /// modal. This is the safety gate, not an error state.
    pub fn display_blocked(&self) -> bool {
        self.strict
            && !self.bypass
            && matches!(self.status, SearchStatus::Failed | SearchStatus::Partial)
    }

    /// Explicit user override: unblock without re-running verification.
    pub fn proceed_anyway(&mut self) {
        self.bypass = true;
    }

    /// Toggle strict mode. Display-only; does not restart the run.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
