use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the page content.
#[must_use]
pub fn fingerprint(content: &[u8]) -> String {
    let hash = Sha256::digest(content);
    format!("{hash:x}")
}
