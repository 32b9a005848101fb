//! Content-addressed cache key generation.

use sha2::{Digest, Sha256};

/// Compute the storage key for a request identity (method + absolute URL).
pub fn compute_request_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
