//! Canonical JSON encoding
//!
//! UTF-8 bytes with keys sorted lexicographically and no insignificant
//! whitespace. The same encoder backs envelope signing, envelope
//! verification, and the hash embedded in sealed tickets, so the bytes a
//! signer commits to are exactly the bytes a verifier reconstructs.

use crate::Result;
use serde::Serialize;

/// Encode any serializable payload as canonical JSON bytes.
///
/// Serialization goes through `serde_json::Value`, whose object map keeps
/// keys in sorted order, so struct field declaration order never leaks
/// into the output.
pub fn canonical_bytes<T: Serialize>(payload: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(payload)?;
    Ok(serde_json::to_vec(&value)?)
}

/// Canonical JSON as a string
pub fn canonical_string<T: Serialize>(payload: &T) -> Result<String> {
    let value = serde_json::to_value(payload)?;
    Ok(serde_json::to_string(&value)?)
}
