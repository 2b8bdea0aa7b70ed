use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("peer endpoint request failed: {0}")]
    PeerFetch(String),

    #[error("peer endpoint returned malformed gateway list: {0}")]
    MalformedPeerList(String),

    #[error("latency probe failed for {url}: {reason}")]
    Probe { url: String, reason: String },

    #[error("gateway pool is empty")]
    EmptyPool,
}
