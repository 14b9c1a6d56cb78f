//! Key-value cache capability shared by the feed fetcher and the analysis cache.
//!
//! Every interaction is best-effort: callers treat any `CacheError` as a miss
//! (for reads) or ignore it (for writes). Components receive the cache as an
//! explicit `Arc<dyn KvCache>` so tests can swap in deterministic fakes.

pub mod memory;
pub mod redis_store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub use memory::{DisabledCache, MemoryCache};
pub use redis_store::RedisCache;

/// Backing store errored or did not answer in time.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Atomic single-key get / set-with-expiry.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}

pub type SharedCache = Arc<dyn KvCache>;

/// Per-key registry of in-flight fills. Concurrent misses on the same key
/// queue behind one guard; the waiter re-reads the cache once it gets the lock.
#[derive(Clone, Default)]
pub struct FillLocks {
    inflight: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl FillLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut inflight = self.inflight.lock().await;
            Arc::clone(
                inflight
                    .entry(key.to_string())
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fill_lock_serializes_same_key() {
        let locks = FillLocks::new();
        let first = locks.acquire("k").await;

        let l2 = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = l2.acquire("k").await;
        });

        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(first);
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn fill_lock_does_not_block_other_keys() {
        let locks = FillLocks::new();
        let _a = locks.acquire("a").await;
        let _b = locks.acquire("b").await;
    }
}
