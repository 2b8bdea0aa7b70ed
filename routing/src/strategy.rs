//! Routing strategies: narrowing the gateway pool to a single URL.
//!
//! `Preferred` never touches the pool. `Random` and `RoundRobin` are cheap
//! pool picks. `Fastest` probes every candidate, so its winner is cached in
//! a second TTL cache independent of the pool cache: discovery and probing
//! have different costs and therefore different lifetimes.

use crate::cache::{TtlCache, PROBE_CACHE_TTL_SECS};
use crate::discovery::{GatewayPoolProvider, PeerSource};
use crate::error::RoutingError;
use crate::health::GatewayHealthTracker;
use arvex_types::{Timestamp, DEFAULT_GATEWAY};
use futures_util::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Timeout for a single latency probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// How a gateway is chosen for each request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoutingStrategy {
    /// Always use the configured preferred gateway.
    Preferred,
    /// Probe the pool and pick the lowest observed latency.
    Fastest,
    /// Uniform random pick from the pool.
    #[default]
    Random,
    /// Rotate through the pool ("balanced").
    RoundRobin,
}

impl FromStr for RoutingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preferred" => Ok(Self::Preferred),
            "fastest" => Ok(Self::Fastest),
            "random" => Ok(Self::Random),
            "roundrobin" | "round-robin" => Ok(Self::RoundRobin),
            other => Err(format!("unknown routing strategy: {other}")),
        }
    }
}

/// Measures request latency to a gateway. Tests substitute in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait LatencyProber {
    async fn probe(&self, url: &str) -> Result<Duration, RoutingError>;
}

/// Probes `{url}/ar-io/info` with a HEAD request and reports elapsed time.
#[derive(Clone, Debug)]
pub struct HttpLatencyProber {
    client: reqwest::Client,
}

impl HttpLatencyProber {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpLatencyProber {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyProber for HttpLatencyProber {
    async fn probe(&self, url: &str) -> Result<Duration, RoutingError> {
        let target = format!("{}/ar-io/info", url.trim_end_matches('/'));
        let started = std::time::Instant::now();
        self.client
            .head(&target)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .map_err(|e| RoutingError::Probe {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(started.elapsed())
    }
}

/// Chooses one gateway URL per request according to the configured strategy.
///
/// Owns the pool provider, health tracker, and both TTL caches; callers
/// construct one router per session so tests get isolated instances.
pub struct GatewayRouter<S, P> {
    pool: GatewayPoolProvider<S>,
    prober: P,
    health: GatewayHealthTracker,
    strategy: RoutingStrategy,
    preferred: Option<String>,
    /// Cached fastest-probe winner.
    probe_cache: TtlCache<String>,
    round_robin_cursor: usize,
}

impl<S: PeerSource, P: LatencyProber> GatewayRouter<S, P> {
    pub fn new(
        pool: GatewayPoolProvider<S>,
        prober: P,
        strategy: RoutingStrategy,
        preferred: Option<String>,
    ) -> Self {
        Self {
            pool,
            prober,
            health: GatewayHealthTracker::new(),
            strategy,
            preferred,
            probe_cache: TtlCache::new(PROBE_CACHE_TTL_SECS),
            round_robin_cursor: 0,
        }
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.strategy
    }

    /// Change strategy/preference. Caches are invalidated so the next
    /// request reflects the new settings immediately.
    pub fn set_strategy(&mut self, strategy: RoutingStrategy, preferred: Option<String>) {
        self.strategy = strategy;
        self.preferred = preferred;
        self.probe_cache.invalidate();
        self.pool.invalidate();
    }

    /// Record that a previously selected gateway failed, so subsequent
    /// pool computations avoid it.
    pub fn record_failure(&mut self, url: &str, now: Timestamp) {
        self.health.record_failure(url, now);
        self.pool.invalidate();
        self.probe_cache.invalidate();
    }

    /// The current gateway pool (discovered, health-filtered, capped).
    pub async fn gateway_pool(&mut self, now: Timestamp) -> Vec<String> {
        self.pool.gateway_pool(&mut self.health, now).await
    }

    /// Select a gateway for one request. Infallible by design: discovery
    /// failures degrade to the default gateway.
    pub async fn select_gateway(&mut self, now: Timestamp) -> String {
        match self.strategy {
            RoutingStrategy::Preferred => self.preferred_gateway(),
            RoutingStrategy::Fastest => self.fastest_gateway(now).await,
            RoutingStrategy::Random => {
                let pool = self.gateway_pool(now).await;
                pool.choose(&mut rand::thread_rng())
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_GATEWAY.to_string())
            }
            RoutingStrategy::RoundRobin => {
                let pool = self.gateway_pool(now).await;
                if pool.is_empty() {
                    return DEFAULT_GATEWAY.to_string();
                }
                let url = pool[self.round_robin_cursor % pool.len()].clone();
                self.round_robin_cursor = self.round_robin_cursor.wrapping_add(1);
                url
            }
        }
    }

    fn preferred_gateway(&self) -> String {
        match self.preferred.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => DEFAULT_GATEWAY.to_string(),
        }
    }

    /// Probe every pool candidate and pick the lowest latency. The winner
    /// is cached; probe failures are recorded against the health tracker.
    async fn fastest_gateway(&mut self, now: Timestamp) -> String {
        if let Some(winner) = self.probe_cache.get(now) {
            return winner;
        }

        let pool = self.gateway_pool(now).await;
        let probes = join_all(pool.iter().map(|url| {
            let prober = &self.prober;
            async move { (url.clone(), prober.probe(url).await) }
        }))
        .await;

        let mut best: Option<(String, Duration)> = None;
        for (url, outcome) in probes {
            match outcome {
                Ok(latency) => {
                    tracing::debug!(gateway = %url, latency_ms = latency.as_millis() as u64, "probe");
                    if best.as_ref().map_or(true, |(_, b)| latency < *b) {
                        best = Some((url, latency));
                    }
                }
                Err(e) => {
                    tracing::debug!(gateway = %url, error = %e, "probe failed");
                    self.health.record_failure(&url, now);
                }
            }
        }

        let winner = best
            .map(|(url, _)| url)
            .or_else(|| pool.first().cloned())
            .unwrap_or_else(|| DEFAULT_GATEWAY.to_string());

        self.probe_cache.put(winner.clone(), now);
        winner
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::GatewayWithStake;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticSource(Vec<String>);

    impl PeerSource for StaticSource {
        async fn fetch_gateways(
            &self,
            _endpoint: &str,
        ) -> Result<Vec<GatewayWithStake>, RoutingError> {
            Ok(self
                .0
                .iter()
                .map(|url| GatewayWithStake {
                    url: url.clone(),
                    total_stake: 0,
                })
                .collect())
        }
    }

    /// Latency map plus a probe counter for cache assertions.
    struct FakeProber {
        latencies: HashMap<String, u64>,
        calls: AtomicUsize,
    }

    impl FakeProber {
        fn new(latencies: &[(&str, u64)]) -> Self {
            Self {
                latencies: latencies
                    .iter()
                    .map(|(url, ms)| (url.to_string(), *ms))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LatencyProber for FakeProber {
        async fn probe(&self, url: &str) -> Result<Duration, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.latencies
                .get(url)
                .map(|ms| Duration::from_millis(*ms))
                .ok_or_else(|| RoutingError::Probe {
                    url: url.to_string(),
                    reason: "unreachable".into(),
                })
        }
    }

    fn router(
        urls: &[&str],
        prober: FakeProber,
        strategy: RoutingStrategy,
        preferred: Option<&str>,
    ) -> GatewayRouter<StaticSource, FakeProber> {
        let source = StaticSource(urls.iter().map(|s| s.to_string()).collect());
        let pool = GatewayPoolProvider::new(source, vec!["https://peers.example".into()]);
        GatewayRouter::new(pool, prober, strategy, preferred.map(String::from))
    }

    #[tokio::test]
    async fn preferred_returns_configured_url() {
        let mut r = router(
            &["https://gw-1.example"],
            FakeProber::new(&[]),
            RoutingStrategy::Preferred,
            Some("https://my-gw.example"),
        );
        assert_eq!(r.select_gateway(Timestamp::new(0)).await, "https://my-gw.example");
    }

    #[tokio::test]
    async fn preferred_blank_falls_back_to_default() {
        let mut r = router(
            &["https://gw-1.example"],
            FakeProber::new(&[]),
            RoutingStrategy::Preferred,
            Some("   "),
        );
        assert_eq!(r.select_gateway(Timestamp::new(0)).await, DEFAULT_GATEWAY);
    }

    #[tokio::test]
    async fn fastest_picks_lowest_latency_and_caches() {
        let urls = ["https://slow.example", "https://fast.example", "https://mid.example"];
        let prober = FakeProber::new(&[
            ("https://slow.example", 900),
            ("https://fast.example", 40),
            ("https://mid.example", 200),
        ]);
        let mut r = router(&urls, prober, RoutingStrategy::Fastest, None);

        assert_eq!(r.select_gateway(Timestamp::new(0)).await, "https://fast.example");
        let probes_after_first = r.prober.calls.load(Ordering::SeqCst);
        assert_eq!(probes_after_first, 3);

        // Second selection within the probe TTL reuses the cached winner.
        assert_eq!(r.select_gateway(Timestamp::new(60)).await, "https://fast.example");
        assert_eq!(r.prober.calls.load(Ordering::SeqCst), probes_after_first);
    }

    #[tokio::test]
    async fn fastest_survives_total_probe_failure() {
        let urls = ["https://gw-1.example", "https://gw-2.example"];
        let mut r = router(&urls, FakeProber::new(&[]), RoutingStrategy::Fastest, None);
        let selected = r.select_gateway(Timestamp::new(0)).await;
        assert!(urls.contains(&selected.as_str()));
    }

    #[tokio::test]
    async fn round_robin_rotates_through_pool() {
        let urls = ["https://gw-1.example", "https://gw-2.example", "https://gw-3.example"];
        let mut r = router(&urls, FakeProber::new(&[]), RoutingStrategy::RoundRobin, None);

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(r.select_gateway(Timestamp::new(0)).await);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 3, "three selections should cover the whole pool");
    }

    #[tokio::test]
    async fn random_picks_from_pool() {
        let urls = ["https://gw-1.example", "https://gw-2.example"];
        let mut r = router(&urls, FakeProber::new(&[]), RoutingStrategy::Random, None);
        let selected = r.select_gateway(Timestamp::new(0)).await;
        assert!(urls.contains(&selected.as_str()));
    }

    #[test]
    fn strategy_parses_from_str() {
        assert_eq!("fastest".parse::<RoutingStrategy>().unwrap(), RoutingStrategy::Fastest);
        assert_eq!(
            "roundRobin".parse::<RoutingStrategy>().unwrap(),
            RoutingStrategy::RoundRobin
        );
        assert!("quickest".parse::<RoutingStrategy>().is_err());
    }
}
