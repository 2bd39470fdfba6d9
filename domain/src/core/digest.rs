//! Content digests.
//!
//! Step records reference their input by digest instead of embedding it, so
//! the same transcript yields the same reference across replays.

use sha2::{Digest, Sha256};

/// Compute the `sha256:<hex>` digest of a text input.
pub fn input_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("sha256:{}", hex_encode(&hasher.finalize()))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
