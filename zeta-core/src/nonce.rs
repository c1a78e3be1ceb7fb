//! Replay-protection nonce store
//!
//! First-use-wins registration of `replay:<public key>:<nonce>` keys with
//! a TTL covering the freshness window plus a skew pad. Two backends with
//! identical semantics: an in-process map swept lazily on a fixed
//! interval, and Redis `SET NX EX` for multi-replica deployments.

use crate::envelope::epoch_now;
use crate::{Result, ZetaError};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;

/// Seconds between lazy sweeps of the in-memory store
pub const STATE_CLEANUP_INTERVAL: f64 = 10.0;

/// Nonce store with interchangeable backends
pub enum NonceStore {
    Memory(MemoryNonceStore),
    Redis(RedisNonceStore),
}

impl NonceStore {
    /// Per-process in-memory backend
    pub fn in_memory() -> Self {
        NonceStore::Memory(MemoryNonceStore::new())
    }

    /// Redis backend; connects and pings before accepting any request
    pub async fn redis(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ZetaError::unavailable(format!("redis connection failed: {e}")))?;
        let mut conn = client
            .get_connection_manager()
            .await
            .map_err(|e| ZetaError::unavailable(format!("redis connection failed: {e}")))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ZetaError::unavailable(format!("redis connection failed: {e}")))?;

        Ok(NonceStore::Redis(RedisNonceStore { conn }))
    }

    /// Register a key, returning true iff it was newly inserted
    pub async fn first_use(&self, key: &str, ttl_seconds: f64) -> Result<bool> {
        match self {
            NonceStore::Memory(store) => Ok(store.first_use(key, ttl_seconds)),
            NonceStore::Redis(store) => store.first_use(key, ttl_seconds).await,
        }
    }
}

/// Mutex-guarded map with lazy expiry sweeps
pub struct MemoryNonceStore {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    // key -> expiry time
    entries: HashMap<String, f64>,
    next_cleanup: f64,
}

impl MemoryNonceStore {
    fn new() -> Self {
        MemoryNonceStore {
            state: Mutex::new(MemoryState {
                entries: HashMap::new(),
                next_cleanup: epoch_now() + STATE_CLEANUP_INTERVAL,
            }),
        }
    }

    fn first_use(&self, key: &str, ttl_seconds: f64) -> bool {
        let now = epoch_now();
        let mut state = self.state.lock().unwrap();

        if state.entries.contains_key(key) {
            return false;
        }
        state.entries.insert(key.to_string(), now + ttl_seconds);

        if state.next_cleanup <= now {
            state.entries.retain(|_, expiry| *expiry > now);
            state.next_cleanup = now + STATE_CLEANUP_INTERVAL;
        }

        true
    }
}

/// Redis-backed store using atomic `SET NX EX`
pub struct RedisNonceStore {
    conn: ConnectionManager,
}

impl RedisNonceStore {
    async fn first_use(&self, key: &str, ttl_seconds: f64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let ttl = ttl_seconds.ceil().max(1.0) as u64;

        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(epoch_now())
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| ZetaError::unavailable(format!("nonce store unavailable: {e}")))?;

        Ok(outcome.is_some())
    }
}
