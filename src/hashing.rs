//! Path and cache-key hashing
//!
//! Stored pageview rows are keyed by `path_hash(path)`, so the same function
//! must be used on the write side (sync engine) and the read side (variant
//! sets in the aggregation cache).

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the raw path bytes
pub fn path_hash(path: &str) -> String {
    hex::encode(Sha256::digest(path.as_bytes()))
}

/// Cache id for a remote request page (`serialized` is the JSON of the request)
pub fn request_cache_id(serialized: &str) -> String {
    format!("gacounter_{}", path_hash(serialized))
}

/// Cache id for an aggregated sum (`prefix` is the bare language code or "")
pub fn sum_cache_id(language_prefix: &str, canonical_path: &str) -> String {
    let key = if language_prefix.is_empty() {
        canonical_path.to_string()
    } else {
        format!("{}/{}", language_prefix, canonical_path)
    };
    format!("gacounter_page_{}", path_hash(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_hash_is_stable_hex() {
        let h = path_hash("/node/5");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, path_hash("/node/5"));
        assert_ne!(h, path_hash("/node/5/"));
    }

    #[test]
    fn test_sum_cache_id_distinguishes_prefix() {
        assert_ne!(sum_cache_id("en", "node/5"), sum_cache_id("", "node/5"));
        assert!(sum_cache_id("", "node/5").starts_with("gacounter_page_"));
    }
}
