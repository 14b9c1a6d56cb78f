use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::analyze::cache::ANALYSIS_TTL;
use crate::quake::fetcher::EVENTS_TTL;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global Prometheus recorder and describe the service series.
    /// Call once per process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;

        describe_counter!("quake_feed_cache_hits_total", "Event feed served from cache.");
        describe_counter!("quake_feed_cache_misses_total", "Event feed cache misses.");
        describe_counter!("quake_feed_upstream_calls_total", "Calls to the upstream feed.");
        describe_counter!("quake_feed_upstream_errors_total", "Failed upstream feed calls.");
        describe_counter!("quake_analysis_cache_hits_total", "Analysis served with a matching signature.");
        describe_counter!("quake_analysis_cache_misses_total", "Cached analysis with a stale signature.");
        describe_counter!("quake_analysis_generated_total", "Successful generation calls.");
        describe_counter!("quake_analysis_generation_errors_total", "Failed generation calls.");
        describe_counter!("quake_analysis_stale_served_total", "Stale analysis served after a failure.");
        describe_counter!("quake_analysis_fallback_total", "Static report served after a failure.");
        describe_histogram!("quake_analysis_generation_ms", "Generation latency in milliseconds.");
        describe_counter!("alerts_upserts_total", "Alert preference writes by merge outcome.");
        describe_counter!("alerts_identity_conflicts_total", "Writes rejected for crossed identities.");

        gauge!("quake_feed_cache_ttl_secs").set(EVENTS_TTL.as_secs() as f64);
        gauge!("quake_analysis_cache_ttl_secs").set(ANALYSIS_TTL.as_secs() as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
