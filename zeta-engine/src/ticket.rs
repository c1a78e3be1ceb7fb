//! Ticket sealing and lifecycle
//!
//! A sealed ticket is `b64(iv) "-" b64(ciphertext)` under the event's
//! AES-256-CBC key. The plaintext carries the ticket claims next to a
//! SHA-256 hash of their canonical JSON; any decryption or hash failure
//! surfaces as the same vague error. Lifecycle transitions are single
//! compare-and-set updates on the ticket's state byte.

use crate::{event, Store};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zeta_core::canonical;
use zeta_core::crypto::{hash, Cipher};
use zeta_core::types::{flag, state};
use zeta_core::{Result, ZetaError};

/// Claims embedded in the encrypted ticket string
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TicketClaims {
    event_id: String,
    public_key: String,
    number: u32,
    version: u8,
    transfer_limit: u8,
    metadata: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct SealedClaims {
    ticket: TicketClaims,
    hash: String,
}

/// A ticket opened (or freshly issued) under a specific holder key
#[derive(Debug, Clone)]
pub struct Ticket {
    pub event_id: String,
    pub public_key: String,
    pub number: u32,
    pub version: u8,
    pub transfer_limit: u8,
    pub metadata: Value,
    event_key: Vec<u8>,
}

fn opaque() -> ZetaError {
    ZetaError::permission_denied("ticket verification failed")
}

/// Issue a fresh ticket, atomically taking the next number
pub async fn register(
    store: &Store,
    event_id: &str,
    public_key: &str,
    transfer_limit: u8,
    metadata: Value,
) -> Result<Ticket> {
    let number = store
        .issue(event_id)
        .await?
        .ok_or_else(|| ZetaError::conflict("unable to issue ticket"))?;
    let event_key = event::event_key(store, event_id).await?;

    Ok(Ticket {
        event_id: event_id.to_string(),
        public_key: public_key.to_string(),
        number,
        version: 0,
        transfer_limit,
        metadata,
        event_key,
    })
}

/// Complete a transfer: advance the version under CAS and rebind the
/// ticket to the recipient's key
pub async fn reissue(store: &Store, current: &Ticket, public_key: &str) -> Result<Ticket> {
    if current.version >= current.transfer_limit {
        return Err(ZetaError::conflict("ticket transfer limit reached"));
    }

    if !store
        .reissue(&current.event_id, current.number, current.version)
        .await?
    {
        return Err(ZetaError::conflict("ticket transfer failed"));
    }

    Ok(Ticket {
        event_id: current.event_id.clone(),
        public_key: public_key.to_string(),
        number: current.number,
        version: current.version + 1,
        transfer_limit: current.transfer_limit,
        metadata: current.metadata.clone(),
        event_key: current.event_key.clone(),
    })
}

/// Unseal a ticket string under the claimed holder key and check it is
/// current: right event, right user, not canceled, not superseded.
pub async fn load(store: &Store, event_id: &str, public_key: &str, sealed: &str) -> Result<Ticket> {
    let event_key = event::event_key(store, event_id).await?;
    let claims = open_claims(&event_key, sealed)?;

    if claims.event_id != event_id {
        return Err(ZetaError::validation("ticket for different event"));
    }
    if claims.public_key != public_key {
        return Err(ZetaError::validation("ticket for different user"));
    }

    let byte = store
        .load_state_byte(event_id, claims.number)
        .await?
        .ok_or_else(|| ZetaError::not_found("event not found"))?;
    if state::is_canceled(byte) {
        return Err(ZetaError::conflict("ticket canceled"));
    }
    if state::version(byte) != claims.version {
        return Err(ZetaError::conflict("ticket superseded"));
    }

    Ok(Ticket {
        event_id: claims.event_id,
        public_key: claims.public_key,
        number: claims.number,
        version: claims.version,
        transfer_limit: claims.transfer_limit,
        metadata: claims.metadata,
        event_key,
    })
}

/// Decrypt a sealed string and check its embedded hash. Every failure in
/// here maps to the same opaque error.
fn open_claims(event_key: &[u8], sealed: &str) -> Result<TicketClaims> {
    let (iv_b64, ciphertext) = sealed.split_once('-').ok_or_else(opaque)?;
    let iv = BASE64.decode(iv_b64).map_err(|_| opaque())?;

    let cipher = Cipher::new(event_key, &iv).map_err(|_| opaque())?;
    let plaintext = cipher.decrypt(ciphertext).map_err(|_| opaque())?;
    let sealed: SealedClaims = serde_json::from_str(&plaintext).map_err(|_| opaque())?;

    let digest = hash::hex_digest(&canonical::canonical_bytes(&sealed.ticket).map_err(|_| opaque())?);
    if !hash::ct_eq(digest.as_bytes(), sealed.hash.as_bytes()) {
        return Err(opaque());
    }

    Ok(sealed.ticket)
}

impl Ticket {
    /// Seal into the opaque wire string with a fresh IV
    pub fn seal(&self) -> Result<String> {
        let claims = TicketClaims {
            event_id: self.event_id.clone(),
            public_key: self.public_key.clone(),
            number: self.number,
            version: self.version,
            transfer_limit: self.transfer_limit,
            metadata: self.metadata.clone(),
        };
        let digest = hash::hex_digest(&canonical::canonical_bytes(&claims)?);
        let body = serde_json::to_string(&SealedClaims {
            ticket: claims,
            hash: digest,
        })?;

        let cipher = Cipher::with_random_iv(&self.event_key)?;
        Ok(format!("{}-{}", cipher.iv_b64(), cipher.encrypt(&body)))
    }

    /// Mark redeemed; fails once redeemed, stamped, or canceled, and for
    /// numbers the event never issued
    pub async fn redeem(&self, store: &Store) -> Result<()> {
        let event = event::load(store, &self.event_id).await?;
        if self.number >= event.issued {
            return Err(ZetaError::conflict("ticket redemption failed"));
        }

        if !store
            .advance_state(
                &self.event_id,
                self.number,
                state::redeemed(self.version),
                state::REDEEMED,
            )
            .await?
        {
            return Err(ZetaError::conflict("ticket redemption failed"));
        }

        Ok(())
    }

    /// Report `(redeemed, stamped)`
    pub async fn verify(&self, store: &Store) -> Result<(bool, bool)> {
        let byte = store
            .load_state_byte(&self.event_id, self.number)
            .await?
            .ok_or_else(|| ZetaError::not_found("event not found"))?;
        if state::is_canceled(byte) {
            return Err(ZetaError::conflict("ticket canceled"));
        }

        Ok((state::is_redeemed(byte), state::is_stamped(byte)))
    }

    /// Stamp a redeemed ticket; both statuses are true afterwards
    pub async fn stamp(&self, store: &Store) -> Result<(bool, bool)> {
        let (redeemed, stamped) = self.verify(store).await?;
        if !redeemed {
            return Err(ZetaError::conflict("ticket has not been redeemed"));
        }
        if stamped {
            return Err(ZetaError::conflict("ticket is already stamped"));
        }

        if !store
            .advance_state(
                &self.event_id,
                self.number,
                state::stamped(self.version),
                state::STAMPED,
            )
            .await?
        {
            return Err(ZetaError::conflict("ticket stamping failed"));
        }

        Ok((true, true))
    }
}

/// Cancel by 0-indexed ticket number, keeping whatever version bits the
/// holder is on. Terminal: nothing advances a canceled ticket.
pub async fn cancel(store: &Store, event_id: &str, number: u32) -> Result<()> {
    if !store.cancel_state(event_id, number).await? {
        return Err(ZetaError::conflict("ticket cancelation failed"));
    }

    Ok(())
}

/// Read a flag byte as `(value, public)`
pub async fn read_flag(store: &Store, event_id: &str, number: u32) -> Result<(u8, bool)> {
    let byte = store
        .load_flag_byte(event_id, number)
        .await?
        .ok_or_else(|| ZetaError::conflict("ticket flag retrieval failed"))?;

    Ok((flag::value(byte), flag::is_public(byte)))
}

/// Partially update a flag byte and return the stored result
pub async fn write_flag(
    store: &Store,
    event_id: &str,
    number: u32,
    value: Option<u8>,
    public: Option<bool>,
) -> Result<(u8, bool)> {
    let (mask, bits) = flag::update(value, public);
    if !store.update_flag_byte(event_id, number, mask, bits).await? {
        return Err(ZetaError::conflict("ticket flag set failed"));
    }

    read_flag(store, event_id, number).await
}
