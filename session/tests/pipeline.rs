//! End-to-end pipeline tests: router, worker and session wired together
//! with in-memory gateways.

use arvex_routing::{
    GatewayPoolProvider, GatewayRouter, GatewayWithStake, LatencyProber, PeerSource, RoutingError,
    RoutingStrategy,
};
use arvex_session::{BrowseConfig, Browser, BrowsePhase, SearchStatus};
use arvex_verification::{sha256_hex, ContentFetcher, FetchedContent, VerificationError};
use arvex_worker::WorkerHandle;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const GW: &str = "https://gw.example";
const TRUSTED: &str = "https://trusted.example";

// -- Fakes -------------------------------------------------------------------

/// Peer endpoint serving one fixed gateway.
struct OneGatewaySource;

impl PeerSource for OneGatewaySource {
    async fn fetch_gateways(&self, _endpoint: &str) -> Result<Vec<GatewayWithStake>, RoutingError> {
        Ok(vec![GatewayWithStake {
            url: GW.to_string(),
            total_stake: 1,
        }])
    }
}

/// Latency prober with a switchable outcome and a call counter.
#[derive(Clone)]
struct FakeProber {
    healthy: bool,
    calls: Arc<AtomicUsize>,
}

impl FakeProber {
    fn healthy() -> Self {
        Self {
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn unhealthy() -> Self {
        Self {
            healthy: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl LatencyProber for FakeProber {
    async fn probe(&self, url: &str) -> Result<Duration, RoutingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(Duration::from_millis(10))
        } else {
            Err(RoutingError::Probe {
                url: url.to_string(),
                reason: "connection refused".into(),
            })
        }
    }
}

/// In-memory gateway network: url -> response.
#[derive(Default, Clone)]
struct FakeFetcher {
    responses: HashMap<String, FetchedContent>,
}

impl FakeFetcher {
    /// A network serving `body` for `tx` with a matching trusted attestation.
    fn serving(tx: &str, body: &[u8]) -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            format!("{GW}/raw/{tx}"),
            FetchedContent {
                body: body.to_vec(),
                content_type: Some("text/html".into()),
                ..FetchedContent::default()
            },
        );
        responses.insert(
            format!("{TRUSTED}/raw/{tx}"),
            FetchedContent {
                digest: Some(sha256_hex(body)),
                ..FetchedContent::default()
            },
        );
        Self { responses }
    }

    /// A name route that never carries the resolved-id header.
    fn unresolvable(name: &str) -> Self {
        let mut responses = HashMap::new();
        responses.insert(
            format!("https://{name}.gw.example"),
            FetchedContent {
                body: b"<html></html>".to_vec(),
                content_type: Some("text/html".into()),
                ..FetchedContent::default()
            },
        );
        Self { responses }
    }
}

impl ContentFetcher for FakeFetcher {
    fn fetch(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send {
        let result = self
            .responses
            .get(url)
            .cloned()
            .ok_or_else(|| VerificationError::Fetch(format!("no route to {url}")));
        async move { result }
    }

    fn head(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FetchedContent, VerificationError>> + Send {
        self.fetch(url)
    }
}

// -- Setup -------------------------------------------------------------------

fn test_config() -> BrowseConfig {
    let mut config = BrowseConfig::default();
    config.routing_strategy = RoutingStrategy::Preferred;
    config.preferred_gateway = Some(GW.to_string());
    config.trusted_gateways = vec![TRUSTED.to_string()];
    config.trusted_gateway_count = 1;
    config
}

async fn browser(
    config: BrowseConfig,
    preflight: FakeProber,
    fetcher: FakeFetcher,
) -> Browser<OneGatewaySource, FakeProber, FakeProber> {
    let pool = GatewayPoolProvider::new(OneGatewaySource, config.peer_endpoints());
    let router = GatewayRouter::new(
        pool,
        FakeProber::healthy(),
        config.routing_strategy,
        config.preferred_gateway.clone(),
    );
    let worker = WorkerHandle::spawn(fetcher);
    Browser::new(config, router, preflight, worker)
        .await
        .expect("valid config")
}

// -- Tests -------------------------------------------------------------------

#[tokio::test]
async fn verified_search_end_to_end() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::serving(TX, b"hello permaweb"),
    )
    .await;

    browser.search(TX).await.expect("valid input");

    let session = browser.session();
    assert_eq!(session.status(), SearchStatus::Verified);
    assert_eq!(session.phase(), BrowsePhase::Complete);
    assert_eq!(session.gateway(), Some(GW));
    assert_eq!(session.resolved_url(), Some(format!("{GW}/{TX}").as_str()));
    assert!(!session.display_blocked());
    assert_eq!(browser.metrics().runs_verified.get(), 1);
    assert_eq!(browser.metrics().searches.get(), 1);
}

#[tokio::test]
async fn invalid_input_is_rejected_before_routing() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::default(),
    )
    .await;

    assert!(browser.search("Not A Valid Input!").await.is_err());
    assert_eq!(browser.metrics().searches.get(), 0);
    assert_eq!(browser.session().status(), SearchStatus::Idle);
}

#[tokio::test]
async fn disabled_verification_serves_direct_path() {
    let mut config = test_config();
    config.verification_enabled = false;

    let mut browser = browser(config, FakeProber::healthy(), FakeFetcher::default()).await;
    browser.search(TX).await.expect("valid input");

    let session = browser.session();
    assert!(session.is_unverified_path());
    assert_eq!(session.phase(), BrowsePhase::Complete);
    assert_eq!(session.resolved_url(), Some(format!("{GW}/{TX}").as_str()));
    assert_eq!(browser.metrics().runs_verified.get(), 0);
}

#[tokio::test]
async fn failed_preflight_consumes_budget_then_proceeds() {
    let mut config = test_config();
    config.verification_enabled = false;
    config.max_retries = 2;

    let preflight = FakeProber::unhealthy();
    let calls = preflight.calls.clone();
    let mut browser = browser(config, preflight, FakeFetcher::default()).await;
    browser.search(TX).await.expect("valid input");

    // Two retried probes plus the final proceed-anyway attempt.
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(browser.metrics().retries.get(), 2);
    assert!(browser.session().is_unverified_path());
}

#[tokio::test(start_paused = true)]
async fn transient_failure_retries_with_backoff_then_goes_manual() {
    // No routes at all: every root fetch fails with a gateway error,
    // which classifies as transient.
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::default(),
    )
    .await;

    browser.search(TX).await.expect("valid input");

    assert_eq!(browser.session().status(), SearchStatus::Failed);
    assert_eq!(browser.metrics().retries.get(), 3);
    // Initial attempt plus three automatic retries.
    assert_eq!(browser.metrics().runs_failed.get(), 4);
    assert!(browser.manual_retry_available());
}

#[tokio::test]
async fn terminal_failure_skips_automatic_retry() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::unresolvable("ar-io"),
    )
    .await;

    browser.search("ar-io").await.expect("valid input");

    assert_eq!(browser.session().status(), SearchStatus::Failed);
    assert_eq!(browser.metrics().runs_failed.get(), 1);
    assert_eq!(browser.metrics().retries.get(), 0);
    assert!(browser.manual_retry_available());
}

#[tokio::test]
async fn manual_retry_runs_with_a_fresh_budget() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::unresolvable("ar-io"),
    )
    .await;

    browser.search("ar-io").await.expect("valid input");
    assert!(browser.manual_retry_available());

    let generation_before = browser.session().generation();
    browser.try_again().await;

    assert!(browser.session().generation() > generation_before);
    assert_eq!(browser.metrics().searches.get(), 2);
}

#[tokio::test]
async fn strict_mode_blocks_failed_display_until_override() {
    let mut config = test_config();
    config.strict_verification = true;

    let mut browser = browser(
        config,
        FakeProber::healthy(),
        FakeFetcher::unresolvable("ar-io"),
    )
    .await;
    browser.search("ar-io").await.expect("valid input");

    assert!(browser.session().display_blocked());
    browser.proceed_anyway();
    assert!(!browser.session().display_blocked());
    assert_eq!(browser.session().status(), SearchStatus::Failed);
}

#[tokio::test]
async fn coming_back_online_reruns_the_last_search_once() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::serving(TX, b"payload"),
    )
    .await;

    browser.search(TX).await.expect("valid input");
    assert_eq!(browser.metrics().runs_verified.get(), 1);

    browser.set_online(false).await;
    assert!(!browser.is_online());
    browser.set_online(true).await;
    assert_eq!(browser.metrics().runs_verified.get(), 2);

    // Already online: no extra run.
    browser.set_online(true).await;
    assert_eq!(browser.metrics().runs_verified.get(), 2);
}

#[tokio::test]
async fn routing_relevant_settings_change_restarts_active_search() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::serving(TX, b"payload"),
    )
    .await;

    browser.search(TX).await.expect("valid input");
    let generation_before = browser.session().generation();

    let mut config = test_config();
    config.trusted_gateway_count = 2;
    browser.update_config(config).await.expect("valid config");

    assert!(browser.session().generation() > generation_before);
    assert_eq!(browser.metrics().runs_verified.get(), 2);
}

#[tokio::test]
async fn cosmetic_settings_change_leaves_the_session_alone() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::serving(TX, b"payload"),
    )
    .await;

    browser.search(TX).await.expect("valid input");
    let generation_before = browser.session().generation();

    let mut config = test_config();
    config.log_level = "debug".into();
    browser.update_config(config).await.expect("valid config");

    assert_eq!(browser.session().generation(), generation_before);
    assert_eq!(browser.metrics().runs_verified.get(), 1);
}

#[tokio::test]
async fn shutdown_falls_back_to_unverified_serving() {
    let mut browser = browser(
        test_config(),
        FakeProber::healthy(),
        FakeFetcher::serving(TX, b"payload"),
    )
    .await;

    browser.shutdown().await;
    browser.search(TX).await.expect("valid input");

    assert!(browser.session().is_unverified_path());
    assert_eq!(browser.session().resolved_url(), Some(format!("{GW}/{TX}").as_str()));
}
