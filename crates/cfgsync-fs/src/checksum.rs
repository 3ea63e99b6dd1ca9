//! Content hashes for change detection
//!
//! Hashes are `sha256:<hex>` strings. They are compared for equality and
//! persisted in the sync ledger, so the format must stay stable.

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

/// Hash of `text`, usually a canonical JSON rendering.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{PREFIX}{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_value() {
        assert_eq!(
            content_hash("hello world"),
            "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn formatting_changes_the_hash() {
        // Callers canonicalize first; the hash itself is byte-exact.
        assert_ne!(content_hash(r#"{"a":1}"#), content_hash(r#"{ "a": 1 }"#));
    }
}
