//! Stable fingerprints of normalized text, used as cache keys.

use sha2::{Digest, Sha256};

/// A collision-resistant digest of a normalized text.
///
/// Equal normalized strings always produce equal fingerprints; distinct
/// strings collide only with negligible probability. Fingerprints are cheap
/// to hash and compare, so they key the cache map directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a normalized text.
    pub fn of_text(text: &str) -> Self {
        let digest = Sha256::digest(text.as_bytes());
        Self(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }

    /// The lowercase hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
