// src/analyze/cache.rs
//! Signature-keyed cache-aside around the analysis generator.
//!
//! The cached entry is reused while the freshest event's `{id}-{updated}`
//! signature is unchanged, so a quiet feed costs zero generation calls. When
//! generation fails the last stored analysis is served regardless of
//! signature, and only if nothing was ever stored does a static report go out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ai_adapter::{AnalysisGenerator, GenerationError, GenerationRequest};
use super::types::AnalysisResult;
use crate::cache::{FillLocks, KvCache};
use crate::quake::Event;

pub const ANALYSIS_CACHE_KEY: &str = "bd_quake_analysis_cache";
pub const ANALYSIS_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAnalysis {
    signature: String,
    analysis: AnalysisResult,
}

/// How a result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Empty input; fixed report.
    Empty,
    /// Cached entry matched the signature.
    Hit,
    /// Generator ran and the result was stored.
    Generated,
    /// Generator failed; a previously stored result was served.
    Stale,
    /// Generator failed and nothing was cached; static report.
    Fallback,
}

impl AnalysisOutcome {
    /// Value for the `X-AI-Cache` response header.
    pub fn header_value(self) -> &'static str {
        match self {
            AnalysisOutcome::Hit => "HIT",
            AnalysisOutcome::Generated => "MISS",
            AnalysisOutcome::Stale => "STALE",
            AnalysisOutcome::Empty | AnalysisOutcome::Fallback => "NONE",
        }
    }
}

pub struct AnalysisCache {
    generator: Arc<dyn AnalysisGenerator>,
    cache: Arc<dyn KvCache>,
    locks: FillLocks,
    ttl: Duration,
}

impl AnalysisCache {
    pub fn new(generator: Arc<dyn AnalysisGenerator>, cache: Arc<dyn KvCache>) -> Self {
        Self {
            generator,
            cache,
            locks: FillLocks::new(),
            ttl: ANALYSIS_TTL,
        }
    }

    /// Always returns a usable report.
    pub async fn analyze(&self, events: &[Event]) -> AnalysisResult {
        self.analyze_with_outcome(events).await.0
    }

    pub async fn analyze_with_outcome(&self, events: &[Event]) -> (AnalysisResult, AnalysisOutcome) {
        let Some(freshest) = events.first() else {
            return (AnalysisResult::no_activity(), AnalysisOutcome::Empty);
        };
        let signature = freshest.signature();

        if let Some(hit) = self.cached_for(&signature).await {
            return (hit, AnalysisOutcome::Hit);
        }

        let _fill = self.locks.acquire(ANALYSIS_CACHE_KEY).await;
        if let Some(hit) = self.cached_for(&signature).await {
            return (hit, AnalysisOutcome::Hit);
        }

        info!(%signature, generator = self.generator.name(), "new or revised event; generating analysis");
        let request = GenerationRequest::from_events(events);
        let started = Instant::now();
        let generated = self.generator.generate(&request).await;
        histogram!("quake_analysis_generation_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        match generated {
            Ok(analysis) => {
                counter!("quake_analysis_generated_total").increment(1);
                self.store(signature, &analysis).await;
                (analysis, AnalysisOutcome::Generated)
            }
            Err(err) => {
                counter!("quake_analysis_generation_errors_total").increment(1);
                warn!(error = %err, generator = self.generator.name(), "analysis generation failed");
                self.fallback(&err).await
            }
        }
    }

    /// Stored analysis when its signature matches.
    async fn cached_for(&self, signature: &str) -> Option<AnalysisResult> {
        let entry = self.read_entry().await?;
        if entry.signature == signature {
            counter!("quake_analysis_cache_hits_total").increment(1);
            debug!(%signature, "serving analysis from cache");
            Some(entry.analysis)
        } else {
            counter!("quake_analysis_cache_misses_total").increment(1);
            None
        }
    }

    async fn read_entry(&self) -> Option<CachedAnalysis> {
        match self.cache.get(ANALYSIS_CACHE_KEY).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "cached analysis undecodable; ignoring");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, backend = self.cache.backend_name(), "analysis cache read failed");
                None
            }
        }
    }

    async fn store(&self, signature: String, analysis: &AnalysisResult) {
        let entry = CachedAnalysis {
            signature,
            analysis: analysis.clone(),
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "analysis serialization failed");
                return;
            }
        };
        if let Err(e) = self.cache.set(ANALYSIS_CACHE_KEY, &bytes, self.ttl).await {
            warn!(error = %e, backend = self.cache.backend_name(), "analysis cache write failed");
        }
    }

    async fn fallback(&self, err: &GenerationError) -> (AnalysisResult, AnalysisOutcome) {
        if let Some(entry) = self.read_entry().await {
            counter!("quake_analysis_stale_served_total").increment(1);
            info!(signature = %entry.signature, "serving stale analysis after generation failure");
            return (entry.analysis, AnalysisOutcome::Stale);
        }
        counter!("quake_analysis_fallback_total").increment(1);
        let report = match err {
            GenerationError::NotConfigured => AnalysisResult::not_configured(),
            _ => AnalysisResult::unavailable(),
        };
        (report, AnalysisOutcome::Fallback)
    }
}
