//! Content integrity verification.
//!
//! The engine fetches content from the routed gateway, then checks it
//! against a quorum of trusted gateways: by SHA-256 digest comparison
//! (default) or by agreement on the transaction signature metadata.
//! Progress and failures stream out as [`arvex_messages::EventEnvelope`]s;
//! per-resource failures are non-fatal, top-level failures end the run.

pub mod digest;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod manifest;

pub use digest::sha256_hex;
pub use engine::{VerificationEngine, VerifyRequest};
pub use error::VerificationError;
pub use fetch::{ContentFetcher, FetchedContent, HttpContentFetcher};
pub use manifest::{PathManifest, MANIFEST_CONTENT_TYPE};
