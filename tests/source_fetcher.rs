//! TTL read-through behaviour of the event feed fetcher.

mod support;

use std::sync::Arc;
use std::time::Duration;

use quake_monitor::cache::{KvCache, MemoryCache};
use quake_monitor::quake::fetcher::EVENTS_CACHE_KEY;
use quake_monitor::quake::{EventCollection, FetchError, SourceFetcher};
use support::{event, CountingFeed};

fn setup(collection: EventCollection) -> (Arc<CountingFeed>, Arc<MemoryCache>, SourceFetcher) {
    let feed = Arc::new(CountingFeed::new(collection));
    let cache = Arc::new(MemoryCache::new());
    let fetcher = SourceFetcher::new(feed.clone(), cache.clone());
    (feed, cache, fetcher)
}

#[tokio::test(start_paused = true)]
async fn one_upstream_call_per_ttl_window() {
    let (feed, _cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));

    let a = fetcher.get().await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let b = fetcher.get().await.unwrap();
    assert_eq!(feed.calls(), 1);
    assert_eq!(a, b);

    tokio::time::advance(Duration::from_secs(31)).await;
    fetcher.get().await.unwrap();
    assert_eq!(feed.calls(), 2);
}

#[tokio::test]
async fn empty_collection_is_cached() {
    let (feed, _cache, fetcher) = setup(EventCollection::new(vec![]));
    assert!(fetcher.get().await.unwrap().is_empty());
    assert!(fetcher.get().await.unwrap().is_empty());
    assert_eq!(feed.calls(), 1);
}

#[tokio::test]
async fn upstream_failure_is_propagated_and_not_cached() {
    let (feed, cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));
    feed.set_failing(true);

    let err = fetcher.get().await.unwrap_err();
    assert!(matches!(err, FetchError::Status(s) if s.as_u16() == 503));
    assert!(cache.get(EVENTS_CACHE_KEY).await.unwrap().is_none());

    feed.set_failing(false);
    assert_eq!(fetcher.get().await.unwrap().features.len(), 1);
    assert_eq!(feed.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_not_served_when_upstream_fails() {
    let (feed, _cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));
    fetcher.get().await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    feed.set_failing(true);
    assert!(fetcher.get().await.is_err());
}

#[tokio::test]
async fn unavailable_cache_falls_through_to_upstream() {
    let (feed, cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));
    cache.set_failing(true);

    assert_eq!(fetcher.get().await.unwrap().features[0].id, "us1");
    assert_eq!(fetcher.get().await.unwrap().features[0].id, "us1");
    assert_eq!(feed.calls(), 2);
}

#[tokio::test]
async fn concurrent_misses_share_one_upstream_call() {
    let (feed, _cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));
    let fetcher = Arc::new(fetcher);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let f = fetcher.clone();
            tokio::spawn(async move { f.get().await.map(|c| c.features.len()) })
        })
        .collect();
    for t in tasks {
        assert_eq!(t.await.unwrap().unwrap(), 1);
    }
    assert_eq!(feed.calls(), 1);
}

#[tokio::test]
async fn passthrough_fields_survive_the_cache() {
    let (_feed, _cache, fetcher) = setup(EventCollection::new(vec![event("us1", 1, 1)]));
    fetcher.get().await.unwrap();
    let cached = fetcher.get().await.unwrap();
    assert_eq!(
        cached.features[0].properties.extra.get("status"),
        Some(&serde_json::json!("reviewed"))
    );
}
