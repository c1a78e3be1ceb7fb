//! SHA-256 helpers

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// SHA-256 digest of raw bytes
pub fn digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 digest as lowercase hex
pub fn hex_digest(data: &[u8]) -> String {
    hex::encode(digest(data))
}

/// Constant-time byte-slice equality
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
