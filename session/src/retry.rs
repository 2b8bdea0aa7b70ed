//! Automatic retry with exponential backoff and jitter.
//!
//! Two mechanisms share one attempt budget: the pre-flight health probe
//! (unhealthy resolved URL triggers a full retry with a fresh routing
//! decision) and resolution errors classified as transient by message
//! keywords. Once the budget is exhausted the pipeline stops retrying and
//! surfaces a manual "try again" control instead.

use rand::Rng;
use std::time::Duration;

/// Default shared attempt budget.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base backoff delay for attempt 0.
const BASE_DELAY_MS: u64 = 500;

/// Upper bound (exclusive) of the random jitter added to each delay.
const JITTER_MS: u64 = 200;

/// Keywords marking a resolution error as transient.
const TRANSIENT_KEYWORDS: &[&str] = &["gateway", "network", "failed to fetch", "timeout", "offline"];

/// Transient errors are retried automatically; terminal ones surface
/// immediately with a manual retry control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    Terminal,
}

/// Classify a resolution error by its message content.
pub fn classify_resolution_error(message: &str) -> ErrorClass {
    let lower = message.to_ascii_lowercase();
    if TRANSIENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        ErrorClass::Transient
    } else {
        ErrorClass::Terminal
    }
}

/// Backoff delay for a 0-indexed attempt: `500ms * 2^attempt` plus up to
/// 200ms of jitter.
pub fn backoff_delay(attempt: u32) -> Duration {
    let base = BASE_DELAY_MS.saturating_mul(1u64 << attempt.min(16));
    let jitter = rand::thread_rng().gen_range(0..JITTER_MS);
    Duration::from_millis(base + jitter)
}

/// What the pipeline should do after a failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry automatically after this delay (new routing decision included).
    Retry { delay: Duration },
    /// Budget exhausted: show the manual "try again" control.
    Manual,
    /// Probe budget exhausted: display anyway rather than stall forever.
    Proceed,
}

/// Tracks the shared attempt budget for one search.
#[derive(Debug)]
pub struct RetryController {
    attempts: u32,
    max_attempts: u32,
    /// Guard against double-scheduling a retry for the same error.
    scheduled: bool,
}

impl RetryController {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            scheduled: false,
        }
    }

    /// Attempts consumed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// A brand-new search gets a full budget again.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.scheduled = false;
    }

    /// The scheduled retry is now running; further errors may schedule again.
    pub fn begin_attempt(&mut self) {
        self.scheduled = false;
    }

    /// Decide what to do about a resolution error.
    pub fn on_resolution_error(&mut self, message: &str) -> RetryDecision {
        if self.scheduled {
            // A retry is already on its way; don't stack another.
            return RetryDecision::Manual;
        }
        if classify_resolution_error(message) == ErrorClass::Terminal || self.exhausted() {
            return RetryDecision::Manual;
        }

        let delay = backoff_delay(self.attempts);
        self.attempts += 1;
        self.scheduled = true;
        tracing::debug!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling automatic retry"
        );
        RetryDecision::Retry { delay }
    }

    /// Decide what to do about a failed pre-flight health probe.
    pub fn on_unhealthy_probe(&mut self) -> RetryDecision {
        if self.exhausted() {
            // Treat the gateway as healthy rather than stalling forever.
            return RetryDecision::Proceed;
        }
        self.attempts += 1;
        RetryDecision::Retry {
            delay: Duration::ZERO,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
