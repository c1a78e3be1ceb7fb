//! ZETA server: endpoint flows and HTTP transport

pub mod config;
pub mod flows;
pub mod http;
pub mod keys;

use std::sync::Arc;
use zeta_core::crypto::KeyPair;
use zeta_core::nonce::NonceStore;
use zeta_engine::Store;

/// Process-wide services, initialized at startup and injected into every
/// handler. Never constructed on the hot path.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub nonces: Arc<NonceStore>,
    pub signer: Arc<KeyPair>,
}

impl AppState {
    pub fn new(store: Store, nonces: NonceStore, signer: KeyPair) -> Self {
        AppState {
            store,
            nonces: Arc::new(nonces),
            signer: Arc::new(signer),
        }
    }
}
