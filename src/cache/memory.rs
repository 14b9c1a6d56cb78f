//! In-process caches: a TTL map for tests/dev and a no-op stand-in when no
//! backing store is configured.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheError, KvCache};

struct Slot {
    value: Vec<u8>,
    expires_at: Instant,
}

/// TTL map keyed by string. Uses `tokio::time::Instant` so paused-clock tests
/// can step past expiry deterministically.
#[derive(Default)]
pub struct MemoryCache {
    slots: Mutex<HashMap<String, Slot>>,
    failing: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `CacheError::Unavailable`.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable("memory cache marked failing".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let mut slots = self.slots.lock().await;
        match slots.get(key) {
            Some(slot) if slot.expires_at > Instant::now() => Ok(Some(slot.value.clone())),
            Some(_) => {
                slots.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        let slot = Slot {
            value: value.to_vec(),
            expires_at: Instant::now() + ttl,
        };
        self.slots.lock().await.insert(key.to_string(), slot);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Used when `REDIS_URL` is absent: every read misses, every write is dropped.
pub struct DisabledCache;

#[async_trait]
impl KvCache for DisabledCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "disabled"
    }
}
