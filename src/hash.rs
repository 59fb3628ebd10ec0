//! SHA-256 fingerprints shared by the cache key, baseline and rule settings

use sha2::{Digest, Sha256};

/// Hash raw bytes into a lowercase hex digest
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Incremental fingerprint over a sequence of string fields.
///
/// Every field is terminated with a NUL byte so that `("ab", "c")` and
/// `("a", "bc")` produce different digests.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, value: &str) -> Self {
        self.hasher.update(value.as_bytes());
        self.hasher.update([0u8]);
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        let a = Fingerprint::new().field("ab").field("c").finish();
        let b = Fingerprint::new().field("a").field("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = Fingerprint::new().field("rule").field("3").finish();
        let b = Fingerprint::new().field("rule").field("3").finish();
        assert_eq!(a, b);
    }
}
