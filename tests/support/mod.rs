// tests/support/mod.rs
// Deterministic fakes shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use quake_monitor::analyze::ai_adapter::{GenerationFuture, GenerationRequest};
use quake_monitor::analyze::{AnalysisGenerator, AnalysisResult, GenerationError, RiskLevel};
use quake_monitor::quake::{Event, EventCollection, FeedClient, FetchError};

pub fn event(id: &str, time: i64, updated: i64) -> Event {
    serde_json::from_value(json!({
        "type": "Feature",
        "id": id,
        "properties": {
            "mag": 4.2,
            "place": format!("near {id}"),
            "time": time,
            "updated": updated,
            "status": "reviewed"
        },
        "geometry": { "type": "Point", "coordinates": [90.4, 23.8, 12.5] }
    }))
    .expect("valid feature")
}

pub fn report(summary: &str) -> AnalysisResult {
    AnalysisResult {
        summary: summary.to_string(),
        risk_level: RiskLevel::High,
        advice: "Drop, cover, hold on.".into(),
        hotspots: vec!["Sylhet".into()],
        depth_trend: "Shallow".into(),
        seasonal_context: "Above average".into(),
    }
}

/// Feed that counts calls and can be switched into failure.
pub struct CountingFeed {
    calls: AtomicUsize,
    failing: AtomicBool,
    collection: Mutex<EventCollection>,
}

impl CountingFeed {
    pub fn new(collection: EventCollection) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            collection: Mutex::new(collection),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FeedClient for CountingFeed {
    async fn fetch(&self) -> Result<EventCollection, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(self.collection.lock().unwrap().clone())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

/// Generator that counts calls, labels each result with the call number and
/// can be switched into failure.
#[derive(Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl AnalysisGenerator for CountingGenerator {
    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.load(Ordering::SeqCst) {
                return Err(GenerationError::Malformed("scripted failure".into()));
            }
            Ok(report(&format!("report #{n}")))
        })
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
