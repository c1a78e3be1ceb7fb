//! Narrow storage interface
//!
//! One method per statement the system needs. Mutating ticket-state
//! methods are compare-and-set: they report whether the guarded update
//! applied, and callers translate a `false` into the matching conflict.
//! Backends: Postgres for deployment, an in-memory map for tests.

use crate::postgres::PgStore;
use zeta_core::{Event, Permissions, Result};

#[cfg(any(test, feature = "test-utils"))]
use crate::memory::MemoryStore;

/// Storage handle shared by every request
#[derive(Clone)]
pub enum Store {
    Postgres(PgStore),
    #[cfg(any(test, feature = "test-utils"))]
    Memory(MemoryStore),
}

macro_rules! dispatch {
    ($self:expr, $store:ident => $call:expr) => {
        match $self {
            Store::Postgres($store) => $call.await,
            #[cfg(any(test, feature = "test-utils"))]
            Store::Memory($store) => $call.await,
        }
    };
}

impl Store {
    /// Fresh in-memory backend
    #[cfg(any(test, feature = "test-utils"))]
    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    /// Insert the event row and its side record in one transaction
    pub async fn create_event(
        &self,
        event: &Event,
        event_key: &[u8],
        owner_public_key: &str,
        owner_key_hash: &[u8],
    ) -> Result<()> {
        dispatch!(self, store => store.create_event(event, event_key, owner_public_key, owner_key_hash))
    }

    pub async fn load_event(&self, event_id: &str) -> Result<Option<Event>> {
        dispatch!(self, store => store.load_event(event_id))
    }

    /// Case-insensitive substring match on event names, row-limited
    pub async fn search_events(&self, text: &str, limit: u32) -> Result<Vec<Event>> {
        dispatch!(self, store => store.search_events(text, limit))
    }

    /// Delete an event; side tables cascade
    pub async fn delete_event(&self, event_id: &str) -> Result<bool> {
        dispatch!(self, store => store.delete_event(event_id))
    }

    pub async fn load_event_key(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        dispatch!(self, store => store.load_event_key(event_id))
    }

    pub async fn load_owner_public_key(&self, event_id: &str) -> Result<Option<String>> {
        dispatch!(self, store => store.load_owner_public_key(event_id))
    }

    pub async fn load_owner_key_hash(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        dispatch!(self, store => store.load_owner_key_hash(event_id))
    }

    /// Atomically take the next ticket number, or None when sold out or
    /// the event does not exist
    pub async fn issue(&self, event_id: &str) -> Result<Option<u32>> {
        dispatch!(self, store => store.issue(event_id))
    }

    /// CAS: bump the state byte to `version + 1` iff it still equals
    /// `version`
    pub async fn reissue(&self, event_id: &str, number: u32, version: u8) -> Result<bool> {
        dispatch!(self, store => store.reissue(event_id, number, version))
    }

    /// CAS: write `value` iff the current byte is below `threshold`
    pub async fn advance_state(
        &self,
        event_id: &str,
        number: u32,
        value: u8,
        threshold: u8,
    ) -> Result<bool> {
        dispatch!(self, store => store.advance_state(event_id, number, value, threshold))
    }

    /// CAS: set both terminal bits iff the byte is not already terminal
    pub async fn cancel_state(&self, event_id: &str, number: u32) -> Result<bool> {
        dispatch!(self, store => store.cancel_state(event_id, number))
    }

    pub async fn load_state_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        dispatch!(self, store => store.load_state_byte(event_id, number))
    }

    /// None when the event has no flag buffer
    pub async fn load_flag_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        dispatch!(self, store => store.load_flag_byte(event_id, number))
    }

    /// Atomic read-modify-write: `new = (old & mask) | bits`
    pub async fn update_flag_byte(
        &self,
        event_id: &str,
        number: u32,
        mask: u8,
        bits: u8,
    ) -> Result<bool> {
        dispatch!(self, store => store.update_flag_byte(event_id, number, mask, bits))
    }

    pub async fn load_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
    ) -> Result<Option<Permissions>> {
        dispatch!(self, store => store.load_permissions(event_id, key_hash))
    }

    pub async fn upsert_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
        permissions: &Permissions,
    ) -> Result<()> {
        dispatch!(self, store => store.upsert_permissions(event_id, key_hash, permissions))
    }

    pub async fn remove_permissions(&self, event_id: &str, key_hash: &[u8]) -> Result<()> {
        dispatch!(self, store => store.remove_permissions(event_id, key_hash))
    }
}
