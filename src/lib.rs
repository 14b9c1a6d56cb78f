// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod alerts;
pub mod analyze;
pub mod api;
pub mod cache;
pub mod config;
pub mod metrics;
pub mod quake;

pub use crate::api::{router, AppState};

use std::sync::Arc;

use tracing::{info, warn};

use crate::alerts::{
    FilePreferenceRepository, MemoryPreferenceRepository, PreferenceRepository, PreferenceStore,
};
use crate::analyze::{build_generator_from_config, AnalysisCache};
use crate::cache::{DisabledCache, RedisCache, SharedCache};
use crate::config::AppConfig;
use crate::quake::{FeedQuery, SourceFetcher, UsgsFeed};

/// Connect the cache, feed, generator and preference storage described by `cfg`.
///
/// An unreachable Redis is not fatal: the service starts with caching
/// disabled, matching how every cache error is treated at request time.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let cache: SharedCache = match &cfg.redis_url {
        Some(url) => match RedisCache::connect(url, &cfg.cache_prefix, cfg.cache_op_timeout).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                warn!(error = %e, "redis unavailable at startup; caching disabled");
                Arc::new(DisabledCache)
            }
        },
        None => Arc::new(DisabledCache),
    };

    let feed = Arc::new(UsgsFeed::new(cfg.feed_url.clone(), FeedQuery::default())?);
    let generator = build_generator_from_config(&cfg.ai);

    let repo: Arc<dyn PreferenceRepository> = match &cfg.alerts_store_path {
        Some(path) => Arc::new(FilePreferenceRepository::open(path).await?),
        None => Arc::new(MemoryPreferenceRepository::new()),
    };

    info!(
        cache = cache.backend_name(),
        generator = generator.name(),
        ai_model = %cfg.ai.model,
        "service state ready"
    );

    Ok(AppState {
        fetcher: Arc::new(SourceFetcher::new(feed, cache.clone())),
        analysis: Arc::new(AnalysisCache::new(generator, cache)),
        preferences: Arc::new(PreferenceStore::new(repo)),
    })
}
