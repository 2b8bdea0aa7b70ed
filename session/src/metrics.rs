//! Prometheus metrics for the browse pipeline.
//!
//! The [`SessionMetrics`] struct owns a dedicated [`Registry`] that a
//! front end can encode into the Prometheus text exposition format (the
//! CLI dumps it behind a flag).

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry, Histogram,
    HistogramOpts, IntCounter, Opts, Registry,
};

/// Central collection of browse-pipeline metrics.
pub struct SessionMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    /// Total searches started.
    pub searches: IntCounter,
    /// Total automatic retries (pre-flight and resolution combined).
    pub retries: IntCounter,
    /// Runs that finished fully verified.
    pub runs_verified: IntCounter,
    /// Runs that finished partially verified.
    pub runs_partial: IntCounter,
    /// Runs that finished failed.
    pub runs_failed: IntCounter,
    /// End-to-end search duration in seconds.
    pub search_duration_secs: Histogram,
}

impl SessionMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let searches = register_int_counter_with_registry!(
            Opts::new("arvex_searches_total", "Total searches started"),
            registry
        )
        .expect("failed to register searches counter");

        let retries = register_int_counter_with_registry!(
            Opts::new("arvex_retries_total", "Total automatic retries"),
            registry
        )
        .expect("failed to register retries counter");

        let runs_verified = register_int_counter_with_registry!(
            Opts::new("arvex_runs_verified_total", "Verification runs fully verified"),
            registry
        )
        .expect("failed to register runs_verified counter");

        let runs_partial = register_int_counter_with_registry!(
            Opts::new("arvex_runs_partial_total", "Verification runs partially verified"),
            registry
        )
        .expect("failed to register runs_partial counter");

        let runs_failed = register_int_counter_with_registry!(
            Opts::new("arvex_runs_failed_total", "Verification runs failed"),
            registry
        )
        .expect("failed to register runs_failed counter");

        let search_duration_secs = register_histogram_with_registry!(
            HistogramOpts::new("arvex_search_duration_seconds", "End-to-end search duration")
                .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
            registry
        )
        .expect("failed to register search_duration histogram");

        Self {
            registry,
            searches,
            retries,
            runs_verified,
            runs_partial,
            runs_failed,
            search_duration_secs,
        }
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
