//! Message types for foreground-to-worker communication.
//!
//! The verification engine runs as a background task and communicates
//! exclusively through these typed messages: requests carry a reply channel,
//! progress flows back as a FIFO stream of [`EventEnvelope`]s. Every
//! envelope is stamped with the generation of the search that produced it so
//! the foreground can drop events from a superseded run.

use arvex_types::Identifier;
use serde::{Deserialize, Serialize};

/// How content integrity is checked against trusted gateways.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    /// SHA-256 digest comparison against trusted gateways.
    Hash,
    /// Quorum agreement on the transaction signature served by trusted gateways.
    Signature,
}

/// Worker-side verification settings, fixed at `Init` and per-`Verify`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub method: VerificationMethod,
    /// How many trusted gateways to consult per resource.
    pub trusted_gateway_count: usize,
    /// Maximum resources verified concurrently.
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            method: VerificationMethod::Hash,
            trusted_gateway_count: 2,
            concurrency: 4,
        }
    }
}

/// Requests accepted by the verification worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum WorkerRequest {
    /// Configure (or reconfigure) the worker.
    Init { config: WorkerConfig },
    /// Start a verification run for an identifier already routed to `gateway`.
    Verify {
        generation: u64,
        identifier: Identifier,
        gateway: String,
        trusted_gateways: Vec<String>,
    },
    /// Drop the worker's digest memo cache.
    ClearCache,
    /// Abort any in-flight run for this identifier (best-effort).
    ClearVerification { identifier: Identifier },
    /// Stop the worker task.
    Shutdown,
}

/// Replies to worker requests. Progress is not reported here; it arrives on
/// the event stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerReply {
    Ack,
    Rejected { reason: String },
}

/// Progress events emitted during a verification run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VerificationEvent {
    /// A gateway has been chosen for this run.
    RoutingGateway { gateway: String },
    /// The run has started; `total` is a lower bound until the manifest loads.
    VerificationStarted { total: usize },
    /// The path manifest (or single file) has been resolved.
    ManifestLoaded { total: usize, single_file: bool },
    /// One resource verified successfully.
    VerificationProgress {
        path: String,
        verified: usize,
        total: usize,
    },
    /// The run finished; `verified`/`failed` are final counts.
    VerificationComplete { verified: usize, failed: usize },
    /// A failure. `path: Some(..)` scopes it to one resource (the run
    /// continues); `path: None` is fatal for the run.
    VerificationFailed {
        path: Option<String>,
        error: String,
    },
}

/// A [`VerificationEvent`] stamped with its originating search generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub generation: u64,
    pub identifier: Identifier,
    pub event: VerificationEvent,
}
