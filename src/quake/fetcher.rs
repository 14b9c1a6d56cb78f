// src/quake/fetcher.rs
//! Read-through TTL cache in front of the upstream feed.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, info, warn};

use super::feed::{FeedClient, FetchError};
use super::types::EventCollection;
use crate::cache::{FillLocks, KvCache};

pub const EVENTS_CACHE_KEY: &str = "bd_quake_data_cache";
pub const EVENTS_TTL: Duration = Duration::from_secs(60);

pub struct SourceFetcher {
    feed: Arc<dyn FeedClient>,
    cache: Arc<dyn KvCache>,
    locks: FillLocks,
}

impl SourceFetcher {
    pub fn new(feed: Arc<dyn FeedClient>, cache: Arc<dyn KvCache>) -> Self {
        Self {
            feed,
            cache,
            locks: FillLocks::new(),
        }
    }

    /// Serve the event collection from cache, or refetch on a miss.
    ///
    /// Cache failures behave like misses. Upstream failures are returned as-is;
    /// there is no stale substitute for feed data.
    pub async fn get(&self) -> Result<EventCollection, FetchError> {
        if let Some(hit) = self.read_cached().await {
            return Ok(hit);
        }

        let _fill = self.locks.acquire(EVENTS_CACHE_KEY).await;
        // Another request may have refilled while we waited.
        if let Some(hit) = self.read_cached().await {
            return Ok(hit);
        }

        counter!("quake_feed_upstream_calls_total").increment(1);
        let mut fresh = match self.feed.fetch().await {
            Ok(c) => c,
            Err(e) => {
                counter!("quake_feed_upstream_errors_total").increment(1);
                warn!(error = %e, feed = self.feed.name(), "feed fetch failed");
                return Err(e);
            }
        };
        fresh.sort_freshest_first();
        info!(
            feed = self.feed.name(),
            count = fresh.features.len(),
            "fetched fresh event feed"
        );

        match serde_json::to_vec(&fresh) {
            Ok(bytes) => {
                if let Err(e) = self.cache.set(EVENTS_CACHE_KEY, &bytes, EVENTS_TTL).await {
                    warn!(error = %e, backend = self.cache.backend_name(), "event cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "event feed serialization failed"),
        }

        Ok(fresh)
    }

    async fn read_cached(&self) -> Option<EventCollection> {
        match self.cache.get(EVENTS_CACHE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(c) => {
                    counter!("quake_feed_cache_hits_total").increment(1);
                    debug!("serving event feed from cache");
                    Some(c)
                }
                Err(e) => {
                    counter!("quake_feed_cache_misses_total").increment(1);
                    warn!(error = %e, "cached event feed undecodable; treating as miss");
                    None
                }
            },
            Ok(None) => {
                counter!("quake_feed_cache_misses_total").increment(1);
                None
            }
            Err(e) => {
                counter!("quake_feed_cache_misses_total").increment(1);
                warn!(error = %e, backend = self.cache.backend_name(), "event cache read failed");
                None
            }
        }
    }
}
