//! The foreground browse orchestrator.
//!
//! [`Browser`] wires routing, the verification worker and the session
//! state machine together: classify the input, pick a gateway, pre-flight
//! it, hand the run to the worker, then drive [`BrowseSession`] from the
//! event stream. Transient failures are retried with backoff out of a
//! shared budget; once the budget is spent the caller gets a manual
//! "try again" control via [`Browser::try_again`].

use crate::config::BrowseConfig;
use crate::error::SessionError;
use crate::machine::BrowseSession;
use crate::metrics::SessionMetrics;
use crate::retry::{RetryController, RetryDecision};
use crate::state::{BrowsePhase, SearchStatus};
use arvex_messages::{EventEnvelope, WorkerReply, WorkerRequest};
use arvex_routing::{GatewayRouter, LatencyProber, PeerSource};
use arvex_types::url::resolved_url;
use arvex_types::{Identifier, Timestamp};
use arvex_worker::WorkerHandle;
use tokio::sync::mpsc;

/// Foreground orchestrator for the browse pipeline.
///
/// `S` and `P` are the router's peer source and latency prober; `Q` is the
/// pre-flight prober that checks the resolved URL before a run starts.
pub struct Browser<S, P, Q> {
    config: BrowseConfig,
    router: GatewayRouter<S, P>,
    preflight: Q,
    worker: Option<WorkerHandle>,
    events: Option<mpsc::Receiver<EventEnvelope>>,
    session: BrowseSession,
    retry: RetryController,
    metrics: SessionMetrics,
    online: bool,
    /// Automatic retries ran out; the next run must be user-initiated.
    manual_retry: bool,
    last_input: Option<Identifier>,
}

impl<S, P, Q> Browser<S, P, Q>
where
    S: PeerSource,
    P: LatencyProber,
    Q: LatencyProber,
{
    /// Build a browser from validated settings and a spawned worker.
    ///
    /// The worker is initialised here; if it rejects the configuration or
    /// is already gone, verification is skipped for every search and
    /// content is served over the direct path instead.
    pub async fn new(
        config: BrowseConfig,
        router: GatewayRouter<S, P>,
        preflight: Q,
        mut worker: WorkerHandle,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let events = worker.take_events();
        let mut browser = Self {
            session: BrowseSession::new(config.strict_verification),
            retry: RetryController::new(config.max_retries),
            config,
            router,
            preflight,
            worker: Some(worker),
            events,
            metrics: SessionMetrics::new(),
            online: true,
            manual_retry: false,
            last_input: None,
        };
        browser.init_worker().await;
        Ok(browser)
    }

    // -- Accessors -----------------------------------------------------------

    pub fn session(&self) -> &BrowseSession {
        &self.session
    }

    pub fn config(&self) -> &BrowseConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Whether the automatic budget is spent and only [`Browser::try_again`]
    /// can start another attempt.
    pub fn manual_retry_available(&self) -> bool {
        self.manual_retry
    }

    /// User override of the strict-mode display gate.
    pub fn proceed_anyway(&mut self) {
        self.session.proceed_anyway();
    }

    // -- Searching -----------------------------------------------------------

    /// Start a new search for raw user input.
    ///
    /// Returns an error only when the input is neither a transaction ID
    /// nor a valid name; everything past classification is reported
    /// through the session state instead.
    pub async fn search(&mut self, input: &str) -> Result<(), SessionError> {
        let identifier = Identifier::classify(input)?;
        self.retry.reset();
        self.manual_retry = false;
        self.last_input = Some(identifier.clone());
        self.metrics.searches.inc();
        self.run(identifier).await;
        Ok(())
    }

    /// Manual retry of the last search with a fresh attempt budget.
    pub async fn try_again(&mut self) {
        let Some(identifier) = self.last_input.clone() else {
            return;
        };
        self.retry.reset();
        self.manual_retry = false;
        self.metrics.searches.inc();
        self.run(identifier).await;
    }

    /// Connectivity change. Going offline suspends searching; coming back
    /// online triggers exactly one automatic re-search of the last input.
    pub async fn set_online(&mut self, online: bool) {
        let was_online = self.online;
        self.online = online;
        if online && !was_online {
            if let Some(identifier) = self.last_input.clone() {
                tracing::info!("connectivity restored, re-running last search");
                self.retry.reset();
                self.manual_retry = false;
                self.run(identifier).await;
            }
        }
    }

    /// Apply new settings. A routing- or verification-relevant change
    /// while a search is active wipes the session and re-runs it under
    /// the new configuration; cosmetic changes touch nothing.
    pub async fn update_config(&mut self, config: BrowseConfig) -> Result<(), SessionError> {
        config.validate()?;
        let restart =
            self.config.routing_relevant_change(&config) && self.session.identifier().is_some();

        self.router
            .set_strategy(config.routing_strategy, config.preferred_gateway.clone());
        self.session.set_strict(config.strict_verification);
        self.config = config;
        self.retry = RetryController::new(self.config.max_retries);

        if restart {
            if let (Some(worker), Some(identifier)) =
                (self.worker.as_ref(), self.session.identifier().cloned())
            {
                // Best effort: the in-flight run is superseded either way.
                let _ = worker
                    .request(WorkerRequest::ClearVerification { identifier })
                    .await;
            }
            self.session
                .reset_for_settings_change(self.config.strict_verification);
            self.init_worker().await;
            if let Some(identifier) = self.last_input.clone() {
                self.manual_retry = false;
                self.run(identifier).await;
            }
        } else {
            self.init_worker().await;
        }
        Ok(())
    }

    /// Clear the worker's trusted-digest memo.
    pub async fn clear_verification_cache(&mut self) {
        if let Some(worker) = self.worker.as_ref() {
            let _ = worker.request(WorkerRequest::ClearCache).await;
        }
    }

    /// Stop the worker. The browser can still serve unverified content.
    pub async fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.request(WorkerRequest::Shutdown).await;
        }
    }

    // -- Internals -----------------------------------------------------------

    async fn init_worker(&mut self) {
        if !self.config.verification_enabled {
            return;
        }
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        match worker
            .request(WorkerRequest::Init {
                config: self.config.worker_config(),
            })
            .await
        {
            Ok(WorkerReply::Ack) => {}
            Ok(WorkerReply::Rejected { reason }) => {
                tracing::warn!(%reason, "worker rejected configuration, verification disabled");
                self.worker = None;
            }
            Err(error) => {
                tracing::warn!(%error, "verification worker unavailable");
                self.worker = None;
            }
        }
    }

    /// One search, including its automatic retries.
    async fn run(&mut self, identifier: Identifier) {
        loop {
            if !self.online {
                tracing::info!("offline, search suspended until connectivity returns");
                return;
            }
            self.retry.begin_attempt();

            let now = Timestamp::now();
            let generation = self.session.begin_search(identifier.clone(), now);
            let gateway = self.router.select_gateway(now).await;
            let url = resolved_url(&identifier, &gateway);

            // Pre-flight: a dead gateway costs a routing retry, not a
            // 30-second fetch timeout inside the worker.
            if let Err(error) = self.preflight.probe(&url).await {
                tracing::debug!(%gateway, %error, "pre-flight probe failed");
                self.router.record_failure(&gateway, now);
                match self.retry.on_unhealthy_probe() {
                    RetryDecision::Retry { .. } => {
                        self.metrics.retries.inc();
                        continue;
                    }
                    // Budget spent: serve from this gateway anyway.
                    _ => {}
                }
            }

            if !self.config.verification_enabled || self.worker.is_none() || self.events.is_none() {
                self.session.mark_unverified(&gateway);
                return;
            }

            let request = WorkerRequest::Verify {
                generation,
                identifier: identifier.clone(),
                gateway: gateway.clone(),
                trusted_gateways: self.config.trusted_gateways.clone(),
            };
            let dispatched = match self.worker.as_ref() {
                Some(worker) => worker.request(request).await,
                None => Err(arvex_worker::WorkerError::ChannelClosed),
            };
            if let Err(error) = dispatched {
                tracing::warn!(%error, "worker unreachable, serving unverified");
                self.worker = None;
                self.session.mark_unverified(&gateway);
                return;
            }

            self.drain_events(&gateway).await;

            match self.session.status() {
                SearchStatus::Verified => {
                    self.metrics.runs_verified.inc();
                    self.observe_duration();
                    return;
                }
                SearchStatus::Partial => {
                    self.metrics.runs_partial.inc();
                    self.observe_duration();
                    return;
                }
                SearchStatus::Failed => {
                    self.metrics.runs_failed.inc();
                    self.observe_duration();
                    let message = self.session.error().unwrap_or_default().to_string();
                    match self.retry.on_resolution_error(&message) {
                        RetryDecision::Retry { delay } => {
                            self.metrics.retries.inc();
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        _ => {
                            self.manual_retry = true;
                            return;
                        }
                    }
                }
                // Unverified path, or the event stream closed mid-run.
                _ => return,
            }
        }
    }

    /// Apply worker events until the current run reaches a terminal state.
    async fn drain_events(&mut self, gateway: &str) {
        let Some(events) = self.events.as_mut() else {
            return;
        };
        loop {
            match events.recv().await {
                Some(envelope) => {
                    let now = Timestamp::now();
                    if !self.session.apply_event(&envelope, now) {
                        // Stale generation; keep draining.
                        continue;
                    }
                    if self.session.is_finished() || self.session.phase() == BrowsePhase::Complete {
                        return;
                    }
                }
                None => {
                    tracing::warn!("worker event stream closed, serving unverified");
                    self.worker = None;
                    self.events = None;
                    self.session.mark_unverified(gateway);
                    return;
                }
            }
        }
    }

    fn observe_duration(&self) {
        if let Some(secs) = self.session.duration_secs() {
            self.metrics.search_duration_secs.observe(secs as f64);
        }
    }
}
