//! Signed request/response envelope
//!
//! Every API payload travels as `Auth<T>`: a `Data<T>` body carrying a
//! single-use nonce, a send timestamp, and the content, signed with
//! RSA-PSS over the body's canonical JSON. `authenticate` checks, in
//! order: freshness, nonce first-use, signature. The nonce is claimed
//! before the signature is examined, so a replayed envelope burns its
//! nonce even when verification is about to fail.

use crate::crypto::asymmetric::{KeyPair, PublicKey};
use crate::nonce::NonceStore;
use crate::{Result, ZetaError};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Accepted clock drift between sender and server, in seconds
pub const FRESHNESS_WINDOW: f64 = 10.0;

/// Extra nonce retention beyond the freshness window, in seconds
pub const TTL_SKEW_PAD: f64 = 1.0;

/// Current time as float seconds since the epoch
pub fn epoch_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

/// Signed data payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data<T> {
    pub nonce: String,
    pub timestamp: f64,
    pub content: T,
}

impl<T> Data<T> {
    /// Wrap content with a fresh nonce and the current timestamp
    pub fn wrap(content: T) -> Self {
        Data {
            nonce: Uuid::new_v4().to_string(),
            timestamp: epoch_now(),
            content,
        }
    }
}

/// Outer packet: signed payload, sender public key, signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auth<T> {
    pub data: Data<T>,
    pub public_key: String,
    pub signature: String,
}

impl<T> Auth<T> {
    /// Borrow the enclosed content without authenticating it
    pub fn content(&self) -> &T {
        &self.data.content
    }
}

impl<T: Serialize> Auth<T> {
    /// Sign `content` with `signer` and wrap it for the wire
    pub fn seal(content: T, signer: &KeyPair) -> Result<Self> {
        let data = Data::wrap(content);
        let signature = signer.sign(&data)?;

        Ok(Auth {
            data,
            public_key: signer.public_pem().to_string(),
            signature,
        })
    }

    /// Authenticate a received packet and return its content.
    ///
    /// Order: freshness (cheapest), nonce registration (authoritative
    /// single-use), signature (most expensive).
    pub async fn authenticate(&self, nonces: &NonceStore) -> Result<&T> {
        if (epoch_now() - self.data.timestamp).abs() > FRESHNESS_WINDOW {
            return Err(ZetaError::validation("timestamp out of sync"));
        }

        let key = format!("replay:{}:{}", self.public_key, self.data.nonce);
        if !nonces.first_use(&key, FRESHNESS_WINDOW + TTL_SKEW_PAD).await? {
            return Err(ZetaError::conflict("duplicate request nonce"));
        }

        let verifier = PublicKey::from_pem(&self.public_key)
            .map_err(|_| ZetaError::permission_denied("signature verification failed"))?;
        if !verifier.verify(&self.signature, &self.data) {
            return Err(ZetaError::permission_denied("signature verification failed"));
        }

        Ok(&self.data.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use crate::ErrorKind;
    use serde_json::json;

    #[tokio::test]
    async fn test_authenticate_accepts_fresh_packet() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let auth = Auth::seal(json!({"op": "noop"}), keypair).unwrap();
        let content = auth.authenticate(&nonces).await.unwrap();
        assert_eq!(content, &json!({"op": "noop"}));
    }

    #[tokio::test]
    async fn test_replay_is_rejected() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let auth = Auth::seal(json!({"op": "noop"}), keypair).unwrap();
        auth.authenticate(&nonces).await.unwrap();

        let err = auth.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.detail(), "duplicate request nonce");
    }

    #[tokio::test]
    async fn test_stale_timestamp_is_rejected() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let mut auth = Auth::seal(json!({"op": "noop"}), keypair).unwrap();
        auth.data.timestamp -= FRESHNESS_WINDOW + 5.0;
        auth.signature = keypair.sign(&auth.data).unwrap();

        let err = auth.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.detail(), "timestamp out of sync");
    }

    #[tokio::test]
    async fn test_future_timestamp_is_rejected() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let mut auth = Auth::seal(json!({"op": "noop"}), keypair).unwrap();
        auth.data.timestamp += FRESHNESS_WINDOW + 5.0;
        auth.signature = keypair.sign(&auth.data).unwrap();

        let err = auth.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.detail(), "timestamp out of sync");
    }

    #[tokio::test]
    async fn test_tampered_content_fails_signature() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let mut auth = Auth::seal(json!({"amount": 1}), keypair).unwrap();
        auth.data.content = json!({"amount": 100});

        let err = auth.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.detail(), "signature verification failed");
    }

    #[tokio::test]
    async fn test_wrong_sender_key_fails_signature() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);
        let other = test_utils::keypair(1);

        // Packet signed by one key but claiming another sender
        let mut auth = Auth::seal(json!({"op": "noop"}), keypair).unwrap();
        auth.public_key = other.public_pem().to_string();

        let err = auth.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.detail(), "signature verification failed");
    }

    #[tokio::test]
    async fn test_nonce_claimed_even_when_signature_fails() {
        let nonces = NonceStore::in_memory();
        let keypair = test_utils::keypair(0);

        let mut tampered = Auth::seal(json!({"n": 1}), keypair).unwrap();
        let original = tampered.clone();
        tampered.data.content = json!({"n": 2});

        let err = tampered.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.detail(), "signature verification failed");

        // The original, honestly signed packet can no longer be used
        let err = original.authenticate(&nonces).await.unwrap_err();
        assert_eq!(err.detail(), "duplicate request nonce");
    }
}
