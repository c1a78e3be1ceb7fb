//! RSA-PSS key management
//!
//! Key pairs travel as PEM (pkcs8 private, SubjectPublicKeyInfo public).
//! Signing commits to the canonical JSON of the payload; verification never
//! errors on a bad signature, it just reports `false`.

use crate::crypto::hash;
use crate::{canonical, Result, ZetaError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::Sha256;
use std::fmt;

/// Default RSA modulus size in bits
pub const DEFAULT_KEY_BITS: usize = 4096;

/// RSA key pair for signing operations
#[derive(Clone)]
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new key pair. Accepted sizes: 1024, 2048, 4096 bits.
    pub fn generate(bits: usize) -> Result<Self> {
        if !matches!(bits, 1024 | 2048 | 4096) {
            return Err(ZetaError::validation("invalid RSA key length"));
        }

        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| ZetaError::internal(format!("key generation failed: {e}")))?;

        Self::from_private_key(private_key)
    }

    /// Load a key pair from a pkcs8 PEM private key
    pub fn from_pem(private_pem: &str) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| ZetaError::validation(format!("invalid private key: {e}")))?;

        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> Result<Self> {
        let public = PublicKey::from_rsa(RsaPublicKey::from(&private_key))?;

        Ok(KeyPair {
            private_key,
            public,
        })
    }

    /// Export the private key as pkcs8 PEM (sensitive operation)
    pub fn private_pem(&self) -> Result<String> {
        let pem = self
            .private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| ZetaError::internal(format!("private key encoding failed: {e}")))?;

        Ok(pem.to_string())
    }

    /// Public half as PEM
    pub fn public_pem(&self) -> &str {
        self.public.pem()
    }

    /// Public half for verification
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign the canonical JSON of `payload`, returning a base64 signature
    pub fn sign<T: Serialize>(&self, payload: &T) -> Result<String> {
        let message = canonical::canonical_bytes(payload)?;
        let signer = SigningKey::<Sha256>::new(self.private_key.clone());
        let signature = signer.sign_with_rng(&mut OsRng, &message);

        Ok(BASE64.encode(signature.to_bytes()))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("fingerprint", &hex::encode(&self.public.fingerprint()[..8]))
            .finish_non_exhaustive()
    }
}

/// Public key for verification operations
#[derive(Clone)]
pub struct PublicKey {
    key: RsaPublicKey,
    pem: String,
}

impl PublicKey {
    /// Parse from a SubjectPublicKeyInfo PEM string
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .map_err(|e| ZetaError::validation(format!("invalid public key: {e}")))?;

        Ok(PublicKey {
            key,
            pem: pem.to_string(),
        })
    }

    fn from_rsa(key: RsaPublicKey) -> Result<Self> {
        let pem = key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| ZetaError::internal(format!("public key encoding failed: {e}")))?;

        Ok(PublicKey { key, pem })
    }

    /// PEM form, exactly as it travels in envelopes
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// SHA-256 of the PEM form, used for owner and permission lookups
    pub fn fingerprint(&self) -> [u8; 32] {
        hash::digest(self.pem.as_bytes())
    }

    /// Verify a base64 RSA-PSS signature over the canonical JSON of
    /// `payload`. Any failure, malformed input included, returns `false`.
    pub fn verify<T: Serialize>(&self, signature_b64: &str, payload: &T) -> bool {
        let Ok(message) = canonical::canonical_bytes(payload) else {
            return false;
        };
        let Ok(raw) = BASE64.decode(signature_b64) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(raw.as_slice()) else {
            return false;
        };

        VerifyingKey::<Sha256>::new(self.key.clone())
            .verify(&message, &signature)
            .is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("fingerprint", &hex::encode(&self.fingerprint()[..8]))
            .finish_non_exhaustive()
    }
}
