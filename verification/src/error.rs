use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("gateway fetch failed: {0}")]
    Fetch(String),

    #[error("malformed path manifest: {0}")]
    Manifest(String),

    #[error("digest mismatch for {path}: local {local}, trusted {trusted}")]
    DigestMismatch {
        path: String,
        local: String,
        trusted: String,
    },

    #[error("signature disagreement for {path}")]
    SignatureMismatch { path: String },

    #[error("no trusted gateway responded for {path}")]
    NoTrustedResponse { path: String },

    #[error("name did not resolve to a transaction ID")]
    Unresolved,
}
