//! AES-256-CBC with PKCS#7 padding
//!
//! One `Cipher` binds a key and an IV. CBC carries no integrity of its
//! own; the ticket layer embeds a hash inside the plaintext and checks it
//! after decryption.

use crate::{Result, ZetaError};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Symmetric key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

/// Block/IV length in bytes
pub const IV_LEN: usize = 16;

/// AES-256-CBC cipher bound to a key and IV
pub struct Cipher {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl Cipher {
    /// Generate a random 256-bit key
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Bind an existing key and IV
    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LEN] = key
            .try_into()
            .map_err(|_| ZetaError::validation("invalid AES key length"))?;
        let iv: [u8; IV_LEN] = iv
            .try_into()
            .map_err(|_| ZetaError::validation("invalid AES IV length"))?;

        Ok(Cipher { key, iv })
    }

    /// Bind a key with a freshly generated random IV
    pub fn with_random_iv(key: &[u8]) -> Result<Self> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        Self::new(key, &iv)
    }

    /// Encrypt UTF-8 plaintext, returning base64 ciphertext
    pub fn encrypt(&self, plaintext: &str) -> String {
        let ciphertext = Aes256CbcEnc::new((&self.key).into(), (&self.iv).into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        BASE64.encode(ciphertext)
    }

    /// Decrypt base64 ciphertext back to UTF-8 plaintext
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<String> {
        let ciphertext = BASE64
            .decode(ciphertext_b64)
            .map_err(|_| ZetaError::validation("malformed ciphertext"))?;

        let plaintext = Aes256CbcDec::new((&self.key).into(), (&self.iv).into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| ZetaError::validation("decryption failed"))?;

        String::from_utf8(plaintext).map_err(|_| ZetaError::validation("decryption failed"))
    }

    /// IV bytes
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    /// Base64-encoded IV, as it appears in the ticket string
    pub fn iv_b64(&self) -> String {
        BASE64.encode(self.iv)
    }
}
