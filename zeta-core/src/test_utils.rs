//! Shared test fixtures
//!
//! RSA key generation dominates test runtime, so tests draw from a small
//! pool of lazily generated 2048-bit key pairs instead of minting fresh
//! ones per case.

use crate::crypto::asymmetric::KeyPair;
use std::sync::OnceLock;

const POOL_SIZE: usize = 6;

static POOL: [OnceLock<KeyPair>; POOL_SIZE] = [const { OnceLock::new() }; POOL_SIZE];

/// Keypair for the given slot; the same slot always returns the same key.
pub fn keypair(slot: usize) -> &'static KeyPair {
    POOL[slot % POOL_SIZE].get_or_init(|| KeyPair::generate(2048).expect("test keypair"))
}
