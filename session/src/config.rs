//! Browse settings with TOML file support.

use crate::error::SessionError;
use arvex_messages::{VerificationMethod, WorkerConfig};
use arvex_routing::RoutingStrategy;
use arvex_types::DEFAULT_GATEWAY;
use serde::{Deserialize, Serialize};

/// User-editable browse settings.
///
/// Can be loaded from a TOML file via [`BrowseConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Routing and the worker read
/// these; mutation goes through [`crate::Browser::update_config`] so an
/// active search restarts under the new settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BrowseConfig {
    /// How a gateway is chosen per request.
    #[serde(default)]
    pub routing_strategy: RoutingStrategy,

    /// Gateway used by the `preferred` strategy.
    #[serde(default)]
    pub preferred_gateway: Option<String>,

    /// Whether content integrity is verified at all.
    #[serde(default = "default_true")]
    pub verification_enabled: bool,

    /// Block display behind an explicit override when verification fails.
    #[serde(default)]
    pub strict_verification: bool,

    /// Digest comparison or signature-metadata agreement.
    #[serde(default = "default_method")]
    pub verification_method: VerificationMethod,

    /// How many trusted gateways to consult per resource.
    #[serde(default = "default_trusted_count")]
    pub trusted_gateway_count: usize,

    /// Maximum resources verified concurrently.
    #[serde(default = "default_concurrency")]
    pub verification_concurrency: usize,

    /// Shared budget for automatic retries (pre-flight and resolution).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Peer endpoint queried for the gateway pool.
    #[serde(default = "default_peer_endpoint")]
    pub trusted_peer_endpoint: String,

    /// Optional local gateway queried before the trusted endpoint.
    #[serde(default)]
    pub local_gateway: Option<String>,

    /// Trusted gateways consulted for attestations.
    #[serde(default = "default_trusted_gateways")]
    pub trusted_gateways: Vec<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_method() -> VerificationMethod {
    VerificationMethod::Hash
}

fn default_trusted_count() -> usize {
    2
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_peer_endpoint() -> String {
    DEFAULT_GATEWAY.to_string()
}

fn default_trusted_gateways() -> Vec<String> {
    vec![DEFAULT_GATEWAY.to_string()]
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for BrowseConfig {
    fn default() -> Self {
        toml::from_str("").expect("empty config populates all defaults")
    }
}

// ── Impl ───────────────────────────────────────────────────────────────

impl BrowseConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SessionError> {
        let config: Self = toml::from_str(s).map_err(|e| SessionError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.verification_enabled && self.trusted_gateway_count == 0 {
            return Err(SessionError::Config(
                "trusted_gateway_count must be at least 1 when verification is enabled".into(),
            ));
        }
        if self.verification_concurrency == 0 {
            return Err(SessionError::Config(
                "verification_concurrency must be at least 1".into(),
            ));
        }
        if self.verification_enabled && self.trusted_gateways.is_empty() {
            return Err(SessionError::Config(
                "at least one trusted gateway is required when verification is enabled".into(),
            ));
        }
        Ok(())
    }

    /// Peer endpoints in preference order: the local gateway, when
    /// configured, is tried before the trusted endpoint.
    pub fn peer_endpoints(&self) -> Vec<String> {
        let mut endpoints = Vec::new();
        if let Some(local) = self.local_gateway.as_deref() {
            if !local.trim().is_empty() {
                endpoints.push(local.to_string());
            }
        }
        endpoints.push(self.trusted_peer_endpoint.clone());
        endpoints
    }

    /// The worker-side slice of these settings.
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            method: self.verification_method,
            trusted_gateway_count: self.trusted_gateway_count,
            concurrency: self.verification_concurrency,
        }
    }

    /// Whether changing to `other` affects routing or verification, i.e.
    /// whether an active search must restart.
    pub fn routing_relevant_change(&self, other: &Self) -> bool {
        self.routing_strategy != other.routing_strategy
            || self.preferred_gateway != other.preferred_gateway
            || self.verification_enabled != other.verification_enabled
            || self.verification_method != other.verification_method
            || self.trusted_gateway_count != other.trusted_gateway_count
            || self.trusted_gateways != other.trusted_gateways
            || self.trusted_peer_endpoint != other.trusted_peer_endpoint
            || self.local_gateway != other.local_gateway
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
