//! Event lifecycle over the store

use crate::Store;
use zeta_core::crypto::{hash, Cipher};
use zeta_core::{Event, EventDraft, Result, ZetaError, MAX_SEARCH_LIMIT};

/// Create an event: validate the draft, mint the event key, zero the
/// state bytes, and record the owner's key and its hash.
pub async fn create(store: &Store, draft: &EventDraft, owner_public_key: &str) -> Result<Event> {
    let event = Event::from_draft(draft)?;
    let event_key = Cipher::generate_key();
    let owner_key_hash = hash::digest(owner_public_key.as_bytes());

    store
        .create_event(&event, &event_key, owner_public_key, &owner_key_hash)
        .await?;

    Ok(event)
}

pub async fn load(store: &Store, event_id: &str) -> Result<Event> {
    store
        .load_event(event_id)
        .await?
        .ok_or_else(|| ZetaError::not_found("event not found"))
}

/// Case-insensitive substring search on event names
pub async fn search(store: &Store, text: &str, limit: u32) -> Result<Vec<Event>> {
    if limit == 0 || limit > MAX_SEARCH_LIMIT {
        return Err(ZetaError::validation("search limit out of range"));
    }

    store.search_events(text, limit).await
}

pub async fn delete(store: &Store, event_id: &str) -> Result<()> {
    if !store.delete_event(event_id).await? {
        return Err(ZetaError::not_found("event not found"));
    }

    Ok(())
}

/// Symmetric ticket-sealing key for an event
pub async fn event_key(store: &Store, event_id: &str) -> Result<Vec<u8>> {
    store
        .load_event_key(event_id)
        .await?
        .ok_or_else(|| ZetaError::not_found("event not found"))
}

pub async fn owner_public_key(store: &Store, event_id: &str) -> Result<String> {
    store
        .load_owner_public_key(event_id)
        .await?
        .ok_or_else(|| ZetaError::not_found("event not found"))
}

pub async fn owner_key_hash(store: &Store, event_id: &str) -> Result<Vec<u8>> {
    store
        .load_owner_key_hash(event_id)
        .await?
        .ok_or_else(|| ZetaError::not_found("event not found"))
}
