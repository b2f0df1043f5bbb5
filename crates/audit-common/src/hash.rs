//! Content hashing for source files.
//!
//! Mirrors the canonical-hash approach used elsewhere in this project for
//! config fingerprinting: SHA-256 over raw bytes, rendered as lowercase hex.
//! `System::file_hash` is computed over the file's raw bytes (not the
//! decoded text), so it stays stable regardless of which encoding a later
//! run declares for the same file.

use sha2::{Digest, Sha256};

/// Compute a deterministic SHA-256 digest of `bytes`, rendered as 64
/// lowercase hex characters.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_64_lowercase_hex_chars() {
        let hash = hash_bytes(b"hello world");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn stable_across_calls() {
        let a = hash_bytes(b"KPWINVERSION: 0.4.7\n");
        let b = hash_bytes(b"KPWINVERSION: 0.4.7\n");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_different_hash() {
        let a = hash_bytes(b"one");
        let b = hash_bytes(b"two");
        assert_ne!(a, b);
    }
}
