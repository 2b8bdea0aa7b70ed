//! Gateway pool discovery.
//!
//! Candidates come from trusted peer endpoints queried in preference order;
//! the first endpoint returning a non-empty list wins. Every fetch failure
//! falls through to the next source, and total failure falls back to the
//! default gateway, so callers always receive at least one URL.

use crate::cache::{TtlCache, POOL_CACHE_TTL_SECS};
use crate::error::RoutingError;
use crate::health::GatewayHealthTracker;
use arvex_types::{Timestamp, DEFAULT_GATEWAY};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of gateways handed to the routing layer.
const MAX_POOL_SIZE: usize = 20;

/// Timeout for a single peer endpoint request.
const PEER_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// A candidate gateway with its on-chain stake weight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayWithStake {
    pub url: String,
    #[serde(rename = "totalStake", default)]
    pub total_stake: u64,
}

/// Source of candidate gateway lists. The HTTP implementation queries a
/// peer endpoint; tests substitute in-memory fakes.
#[allow(async_fn_in_trait)]
pub trait PeerSource {
    async fn fetch_gateways(&self, endpoint: &str) -> Result<Vec<GatewayWithStake>, RoutingError>;
}

/// Queries `{endpoint}/ar-io/gateways` for a JSON gateway list.
#[derive(Clone, Debug)]
pub struct HttpPeerSource {
    client: reqwest::Client,
}

impl HttpPeerSource {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpPeerSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerSource for HttpPeerSource {
    async fn fetch_gateways(&self, endpoint: &str) -> Result<Vec<GatewayWithStake>, RoutingError> {
        let url = format!("{}/ar-io/gateways", endpoint.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .timeout(PEER_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| RoutingError::PeerFetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| RoutingError::PeerFetch(e.to_string()))?;

        response
            .json::<Vec<GatewayWithStake>>()
            .await
            .map_err(|e| RoutingError::MalformedPeerList(e.to_string()))
    }
}

/// Produces the ordered gateway pool consumed by the routing strategy.
///
/// The computed pool (discovered, health-filtered, shuffled, capped) is
/// cached for [`POOL_CACHE_TTL_SECS`] so repeated requests within the
/// window skip discovery entirely.
pub struct GatewayPoolProvider<S> {
    source: S,
    /// Trusted peer endpoints in preference order.
    endpoints: Vec<String>,
    cache: TtlCache<Vec<String>>,
}

impl<S: PeerSource> GatewayPoolProvider<S> {
    pub fn new(source: S, endpoints: Vec<String>) -> Self {
        Self {
            source,
            endpoints,
            cache: TtlCache::new(POOL_CACHE_TTL_SECS),
        }
    }

    /// Return the current gateway pool. Never empty and never an error:
    /// discovery failures degrade to the default gateway.
    pub async fn gateway_pool(
        &mut self,
        health: &mut GatewayHealthTracker,
        now: Timestamp,
    ) -> Vec<String> {
        if let Some(pool) = self.cache.get(now) {
            return pool;
        }

        let discovered = self.discover().await;
        let mut pool = health.filter_healthy(discovered, now);
        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(MAX_POOL_SIZE);

        self.cache.put(pool.clone(), now);
        pool
    }

    /// Drop the cached pool so the next request re-queries peer endpoints.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    /// Query endpoints in order; first non-empty list wins.
    async fn discover(&self) -> Vec<String> {
        for endpoint in &self.endpoints {
            match self.source.fetch_gateways(endpoint).await {
                Ok(gateways) if !gateways.is_empty() => {
                    tracing::debug!(
                        endpoint = %endpoint,
                        count = gateways.len(),
                        "discovered gateway pool"
                    );
                    return gateways.into_iter().map(|g| g.url).collect();
                }
                Ok(_) => {
                    tracing::debug!(endpoint = %endpoint, "peer endpoint returned empty list");
                }
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, error = %e, "peer endpoint failed");
                }
            }
        }

        tracing::debug!("all peer endpoints failed; falling back to default gateway");
        vec![DEFAULT_GATEWAY.to_string()]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
