//! Signature-driven cache-aside behaviour of the analysis layer.

mod support;

use std::sync::Arc;
use std::time::Duration;

use quake_monitor::analyze::cache::ANALYSIS_CACHE_KEY;
use quake_monitor::analyze::{AnalysisCache, AnalysisOutcome, AnalysisResult};
use quake_monitor::cache::{KvCache, MemoryCache};
use support::{event, CountingGenerator};

fn setup() -> (Arc<CountingGenerator>, Arc<MemoryCache>, AnalysisCache) {
    let gen = Arc::new(CountingGenerator::default());
    let cache = Arc::new(MemoryCache::new());
    let ac = AnalysisCache::new(gen.clone(), cache.clone());
    (gen, cache, ac)
}

#[tokio::test]
async fn empty_input_returns_fixed_low_report_without_generation() {
    let (gen, _cache, ac) = setup();
    for _ in 0..3 {
        assert_eq!(ac.analyze(&[]).await, AnalysisResult::no_activity());
    }
    assert_eq!(gen.calls(), 0);
}

#[tokio::test]
async fn unchanged_head_event_generates_once() {
    let (gen, _cache, ac) = setup();
    let events = vec![event("us1", 2_000, 2_100), event("us0", 1_000, 1_100)];

    let (first, o1) = ac.analyze_with_outcome(&events).await;
    let (second, o2) = ac.analyze_with_outcome(&events).await;

    assert_eq!(gen.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(o1, AnalysisOutcome::Generated);
    assert_eq!(o2, AnalysisOutcome::Hit);
}

#[tokio::test]
async fn revised_head_event_forces_regeneration() {
    let (gen, _cache, ac) = setup();
    ac.analyze(&[event("us1", 2_000, 2_100)]).await;
    let revised = ac.analyze(&[event("us1", 2_000, 2_500)]).await;

    assert_eq!(gen.calls(), 2);
    assert_eq!(revised.summary, "report #2");
}

#[tokio::test]
async fn new_head_event_forces_regeneration() {
    let (gen, _cache, ac) = setup();
    ac.analyze(&[event("us1", 2_000, 2_100)]).await;
    ac.analyze(&[event("us2", 3_000, 3_000), event("us1", 2_000, 2_100)])
        .await;
    assert_eq!(gen.calls(), 2);
}

#[tokio::test]
async fn failure_serves_prior_result_of_any_signature() {
    let (gen, _cache, ac) = setup();
    let prior = ac.analyze(&[event("us1", 2_000, 2_100)]).await;

    gen.set_failing(true);
    let (served, outcome) = ac
        .analyze_with_outcome(&[event("us9", 9_000, 9_000)])
        .await;

    assert_eq!(gen.calls(), 2);
    assert_eq!(served, prior);
    assert_eq!(outcome, AnalysisOutcome::Stale);
}

#[tokio::test]
async fn stale_entry_is_not_replaced_by_failure() {
    let (gen, _cache, ac) = setup();
    let prior = ac.analyze(&[event("us1", 2_000, 2_100)]).await;

    gen.set_failing(true);
    ac.analyze(&[event("us9", 9_000, 9_000)]).await;
    gen.set_failing(false);

    // The original signature is still the cached one.
    let again = ac.analyze(&[event("us1", 2_000, 2_100)]).await;
    assert_eq!(again, prior);
    assert_eq!(gen.calls(), 2);
}

#[tokio::test]
async fn failure_without_cache_returns_static_unavailable() {
    let (gen, _cache, ac) = setup();
    gen.set_failing(true);

    let (served, outcome) = ac.analyze_with_outcome(&[event("us1", 1, 1)]).await;
    assert_eq!(served, AnalysisResult::unavailable());
    assert_eq!(outcome, AnalysisOutcome::Fallback);
}

#[tokio::test]
async fn unavailable_cache_still_generates() {
    let (gen, cache, ac) = setup();
    cache.set_failing(true);

    let events = [event("us1", 1, 1)];
    let a = ac.analyze(&events).await;
    let b = ac.analyze(&events).await;

    // Without a working cache every call regenerates, but none fails.
    assert_eq!(gen.calls(), 2);
    assert_eq!(a.summary, "report #1");
    assert_eq!(b.summary, "report #2");
}

#[tokio::test]
async fn failure_and_unavailable_cache_returns_static_unavailable() {
    let (gen, cache, ac) = setup();
    cache.set_failing(true);
    gen.set_failing(true);
    assert_eq!(
        ac.analyze(&[event("us1", 1, 1)]).await,
        AnalysisResult::unavailable()
    );
}

#[tokio::test]
async fn concurrent_requests_share_one_generation() {
    let (gen, _cache, ac) = setup();
    let ac = Arc::new(ac);
    let events = vec![event("us1", 2_000, 2_100)];

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let ac = ac.clone();
            let events = events.clone();
            tokio::spawn(async move { ac.analyze(&events).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap();
    }
    assert_eq!(gen.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn entry_expires_after_one_hour() {
    let (gen, cache, ac) = setup();
    let events = [event("us1", 1, 1)];
    ac.analyze(&events).await;
    assert_eq!(cache.set_calls(), 1);

    tokio::time::advance(Duration::from_secs(3_599)).await;
    ac.analyze(&events).await;
    assert_eq!(gen.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(cache.get(ANALYSIS_CACHE_KEY).await.unwrap().is_none());
    ac.analyze(&events).await;
    assert_eq!(gen.calls(), 2);
}
