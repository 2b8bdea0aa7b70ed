//! SHA-256 digests and quorum agreement.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a byte buffer.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Quorum check: every responding trusted attestation must agree with the
/// local value. Returns `None` when there were no responses at all (the
/// caller treats that as a failure, not a pass).
pub fn quorum_agrees(local: &str, attestations: &[String]) -> Option<bool> {
    if attestations.is_empty() {
        return None;
    }
    Some(attestations.iter().all(|a| a.eq_ignore_ascii_case(local)))
}
