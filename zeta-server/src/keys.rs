//! Server signing keypair
//!
//! The server signs every response, so a PEM keypair is loaded at startup
//! and generated on first run.

use std::fs;
use std::path::Path;
use tracing::info;
use zeta_core::crypto::asymmetric::{KeyPair, DEFAULT_KEY_BITS};
use zeta_core::{Result, ZetaError};

/// Load the private key from `private_path`, or generate a fresh pair and
/// write both PEM files.
pub fn load_or_generate(private_path: &Path, public_path: &Path) -> Result<KeyPair> {
    if private_path.exists() {
        let pem = fs::read_to_string(private_path).map_err(|e| {
            ZetaError::internal(format!("failed to read {}: {e}", private_path.display()))
        })?;
        return KeyPair::from_pem(&pem);
    }

    info!("generating server keypair at {}", private_path.display());
    let keypair = KeyPair::generate(DEFAULT_KEY_BITS)?;

    if let Some(parent) = private_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            ZetaError::internal(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    fs::write(private_path, keypair.private_pem()?).map_err(|e| {
        ZetaError::internal(format!("failed to write {}: {e}", private_path.display()))
    })?;
    fs::write(public_path, keypair.public_pem()).map_err(|e| {
        ZetaError::internal(format!("failed to write {}: {e}", public_path.display()))
    })?;

    Ok(keypair)
}
