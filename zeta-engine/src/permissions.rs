//! Capability resolution
//!
//! The owner, identified by a constant-time hash comparison against the
//! recorded key, holds every capability. Anyone else gets exactly what
//! their permissions row grants; no row means no capabilities. Writing an
//! all-false set deletes the row to keep the table sparse.

use crate::{event, Store};
use zeta_core::crypto::hash;
use zeta_core::{Permissions, Result};

/// Check whether `public_key` is the event owner
pub async fn is_owner(store: &Store, event_id: &str, public_key: &str) -> Result<bool> {
    let owner_key_hash = event::owner_key_hash(store, event_id).await?;
    let caller_hash = hash::digest(public_key.as_bytes());

    Ok(hash::ct_eq(&caller_hash, &owner_key_hash))
}

/// Resolve the capability set held by `public_key` on the event
pub async fn load(store: &Store, event_id: &str, public_key: &str) -> Result<Permissions> {
    if is_owner(store, event_id, public_key).await? {
        return Ok(Permissions::grant_all());
    }

    let key_hash = hash::digest(public_key.as_bytes());
    Ok(store
        .load_permissions(event_id, &key_hash)
        .await?
        .unwrap_or_default())
}

/// Write the capability set for a target key
pub async fn update(
    store: &Store,
    event_id: &str,
    target_public_key: &str,
    permissions: &Permissions,
) -> Result<()> {
    let key_hash = hash::digest(target_public_key.as_bytes());

    if permissions.is_empty() {
        store.remove_permissions(event_id, &key_hash).await
    } else {
        store
            .upsert_permissions(event_id, &key_hash, permissions)
            .await
    }
}
