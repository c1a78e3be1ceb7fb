//! In-memory storage backend for tests
//!
//! Mirrors the Postgres adapter's compare-and-set semantics under a single
//! process-wide lock, so engine and endpoint tests run without a database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use zeta_core::{state, Event, Permissions, Result};

struct EventRecord {
    event: Event,
    event_key: Vec<u8>,
    owner_public_key: String,
    owner_key_hash: Vec<u8>,
    state_bytes: Vec<u8>,
    flag_bytes: Option<Vec<u8>>,
    permissions: HashMap<Vec<u8>, Permissions>,
}

/// Map-backed store with CAS semantics
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, EventRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) async fn create_event(
        &self,
        event: &Event,
        event_key: &[u8],
        owner_public_key: &str,
        owner_key_hash: &[u8],
    ) -> Result<()> {
        let mut events = self.inner.lock().unwrap();
        events.insert(
            event.id.clone(),
            EventRecord {
                event: event.clone(),
                event_key: event_key.to_vec(),
                owner_public_key: owner_public_key.to_string(),
                owner_key_hash: owner_key_hash.to_vec(),
                state_bytes: vec![0; event.tickets as usize],
                flag_bytes: event.enable_flags.then(|| vec![0; event.tickets as usize]),
                permissions: HashMap::new(),
            },
        );

        Ok(())
    }

    pub(crate) async fn load_event(&self, event_id: &str) -> Result<Option<Event>> {
        let events = self.inner.lock().unwrap();
        Ok(events.get(event_id).map(|record| record.event.clone()))
    }

    pub(crate) async fn search_events(&self, text: &str, limit: u32) -> Result<Vec<Event>> {
        let needle = text.to_lowercase();
        let events = self.inner.lock().unwrap();

        Ok(events
            .values()
            .filter(|record| record.event.name.to_lowercase().contains(&needle))
            .take(limit as usize)
            .map(|record| record.event.clone())
            .collect())
    }

    pub(crate) async fn delete_event(&self, event_id: &str) -> Result<bool> {
        let mut events = self.inner.lock().unwrap();
        Ok(events.remove(event_id).is_some())
    }

    pub(crate) async fn load_event_key(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        let events = self.inner.lock().unwrap();
        Ok(events.get(event_id).map(|record| record.event_key.clone()))
    }

    pub(crate) async fn load_owner_public_key(&self, event_id: &str) -> Result<Option<String>> {
        let events = self.inner.lock().unwrap();
        Ok(events
            .get(event_id)
            .map(|record| record.owner_public_key.clone()))
    }

    pub(crate) async fn load_owner_key_hash(&self, event_id: &str) -> Result<Option<Vec<u8>>> {
        let events = self.inner.lock().unwrap();
        Ok(events
            .get(event_id)
            .map(|record| record.owner_key_hash.clone()))
    }

    pub(crate) async fn issue(&self, event_id: &str) -> Result<Option<u32>> {
        let mut events = self.inner.lock().unwrap();
        let Some(record) = events.get_mut(event_id) else {
            return Ok(None);
        };

        if record.event.issued < record.event.tickets {
            record.event.issued += 1;
            Ok(Some(record.event.issued - 1))
        } else {
            Ok(None)
        }
    }

    pub(crate) async fn reissue(&self, event_id: &str, number: u32, version: u8) -> Result<bool> {
        self.cas_state(event_id, number, |byte| (byte == version).then_some(version + 1))
            .await
    }

    pub(crate) async fn advance_state(
        &self,
        event_id: &str,
        number: u32,
        value: u8,
        threshold: u8,
    ) -> Result<bool> {
        self.cas_state(event_id, number, |byte| (byte < threshold).then_some(value))
            .await
    }

    pub(crate) async fn cancel_state(&self, event_id: &str, number: u32) -> Result<bool> {
        self.cas_state(event_id, number, |byte| {
            (byte < state::CANCELED).then_some(byte | state::CANCELED)
        })
        .await
    }

    async fn cas_state(
        &self,
        event_id: &str,
        number: u32,
        update: impl FnOnce(u8) -> Option<u8>,
    ) -> Result<bool> {
        let mut events = self.inner.lock().unwrap();
        let Some(byte) = events
            .get_mut(event_id)
            .and_then(|record| record.state_bytes.get_mut(number as usize))
        else {
            return Ok(false);
        };

        match update(*byte) {
            Some(value) => {
                *byte = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) async fn load_state_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        let events = self.inner.lock().unwrap();
        Ok(events
            .get(event_id)
            .and_then(|record| record.state_bytes.get(number as usize))
            .copied())
    }

    pub(crate) async fn load_flag_byte(&self, event_id: &str, number: u32) -> Result<Option<u8>> {
        let events = self.inner.lock().unwrap();
        Ok(events
            .get(event_id)
            .and_then(|record| record.flag_bytes.as_ref())
            .and_then(|flags| flags.get(number as usize))
            .copied())
    }

    pub(crate) async fn update_flag_byte(
        &self,
        event_id: &str,
        number: u32,
        mask: u8,
        bits: u8,
    ) -> Result<bool> {
        let mut events = self.inner.lock().unwrap();
        let Some(byte) = events
            .get_mut(event_id)
            .and_then(|record| record.flag_bytes.as_mut())
            .and_then(|flags| flags.get_mut(number as usize))
        else {
            return Ok(false);
        };

        *byte = (*byte & mask) | bits;
        Ok(true)
    }

    pub(crate) async fn load_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
    ) -> Result<Option<Permissions>> {
        let events = self.inner.lock().unwrap();
        Ok(events
            .get(event_id)
            .and_then(|record| record.permissions.get(key_hash))
            .copied())
    }

    pub(crate) async fn upsert_permissions(
        &self,
        event_id: &str,
        key_hash: &[u8],
        permissions: &Permissions,
    ) -> Result<()> {
        let mut events = self.inner.lock().unwrap();
        if let Some(record) = events.get_mut(event_id) {
            record.permissions.insert(key_hash.to_vec(), *permissions);
        }

        Ok(())
    }

    pub(crate) async fn remove_permissions(&self, event_id: &str, key_hash: &[u8]) -> Result<()> {
        let mut events = self.inner.lock().unwrap();
        if let Some(record) = events.get_mut(event_id) {
            record.permissions.remove(key_hash);
        }

        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
