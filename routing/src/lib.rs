//! Gateway discovery, health tracking, and routing strategies.
//!
//! The router turns "which gateway should serve this request?" into a
//! layered decision: a pool of candidates is discovered from trusted peer
//! endpoints (cached with a TTL), filtered through a failure-memory health
//! tracker, shuffled, and finally narrowed to one URL by the configured
//! strategy. Discovery problems never surface to the caller; the worst
//! case is always the default gateway.

pub mod cache;
pub mod discovery;
pub mod error;
pub mod health;
pub mod strategy;

pub use cache::TtlCache;
pub use discovery::{GatewayPoolProvider, GatewayWithStake, HttpPeerSource, PeerSource};
pub use error::RoutingError;
pub use health::GatewayHealthTracker;
pub use strategy::{GatewayRouter, HttpLatencyProber, LatencyProber, RoutingStrategy};
