//! AI adapter: generator abstraction, Gemini provider, test doubles and a
//! daily call budget.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::types::{AnalysisResult, ProjectedEvent, RiskLevel};
use crate::config::ai::AiConfig;

/// Largest number of events forwarded to the generator.
pub const MAX_PROMPT_EVENTS: usize = 15;

/// Generation call failed or returned a payload outside the contract.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation is not configured (missing API key)")]
    NotConfigured,
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service returned HTTP {0}")]
    Status(reqwest::StatusCode),
    #[error("generation service returned no content")]
    EmptyResponse,
    #[error("generation output malformed: {0}")]
    Malformed(String),
    #[error("daily generation limit of {0} reached")]
    DailyLimit(u32),
}

/// Instruction plus the projected events it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub events: Vec<ProjectedEvent>,
}

impl GenerationRequest {
    pub fn from_events(events: &[crate::quake::Event]) -> Self {
        let events: Vec<ProjectedEvent> = events
            .iter()
            .take(MAX_PROMPT_EVENTS)
            .map(ProjectedEvent::from)
            .collect();
        let data = serde_json::to_string(&events).unwrap_or_else(|_| "[]".to_string());
        let prompt = format!(
            "Analyze the following recent earthquake data for Bangladesh and surrounding regions (India, Myanmar border).\n\
             Data: {data}\n\n\
             Provide a comprehensive situation report for a public dashboard.\n\
             1. Determine the overall risk level.\n\
             2. Identify specific regions/cities that are 'hotspots' based on this data.\n\
             3. Analyze the depth of the quakes (Shallow < 70km vs Deep) and what it implies.\n\
             4. Provide historical/seasonal context if possible (is this normal frequency?).\n\
             5. One sentence of actionable advice."
        );
        Self { prompt, events }
    }
}

pub type GenerationFuture<'a> =
    Pin<Box<dyn Future<Output = Result<AnalysisResult, GenerationError>> + Send + 'a>>;

/// Low-level generator: does the (expensive) remote call.
pub trait AnalysisGenerator: Send + Sync {
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> GenerationFuture<'a>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn AnalysisGenerator>;

/// Factory: build a generator according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` returns a deterministic mock.
/// * `AI_TEST_MODE=error` returns a generator that always fails.
/// * `enabled == false` or no API key returns the disabled generator.
/// * Otherwise Gemini, wrapped with the daily budget.
pub fn build_generator_from_config(config: &AiConfig) -> DynGenerator {
    match std::env::var("AI_TEST_MODE").ok().as_deref() {
        Some("mock") => return Arc::new(MockGenerator::default()),
        Some("error") => return Arc::new(ErrorGenerator),
        _ => {}
    }

    if !config.enabled || !config.has_api_key() {
        return Arc::new(DisabledGenerator);
    }

    match config.provider.as_str() {
        "mock" => Arc::new(MockGenerator::default()),
        "gemini" => match GeminiGenerator::new(config) {
            Ok(gemini) => Arc::new(BudgetedGenerator::new(gemini, config.daily_limit)),
            Err(e) => {
                tracing::warn!(error = %e, "gemini client build failed; generation disabled");
                Arc::new(DisabledGenerator)
            }
        },
        other => {
            tracing::warn!(provider = other, "unsupported AI provider; generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

// ------------------------------------------------------------
// Gemini
// ------------------------------------------------------------

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiGenerator {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(config: &AiConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("quake-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Structured-output contract: all six fields required.
fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING", "description": "2-3 sentence summary of recent activity." },
            "riskLevel": { "type": "STRING", "enum": RiskLevel::ALL },
            "advice": { "type": "STRING", "description": "One concise sentence of safety advice." },
            "hotspots": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of 1-3 specific regions or cities most affected recently."
            },
            "depthTrend": { "type": "STRING", "description": "Analysis of depth patterns (e.g., 'Mostly shallow events implying felt tremors')." },
            "seasonalContext": { "type": "STRING", "description": "Context regarding frequency compared to typical norms." }
        },
        "required": ["summary", "riskLevel", "advice", "hotspots", "depthTrend", "seasonalContext"]
    })
}

impl AnalysisGenerator for GeminiGenerator {
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(GenerationError::NotConfigured);
            }

            #[derive(Deserialize)]
            struct Resp {
                #[serde(default)]
                candidates: Vec<Candidate>,
            }
            #[derive(Deserialize)]
            struct Candidate {
                content: Option<Content>,
            }
            #[derive(Deserialize)]
            struct Content {
                #[serde(default)]
                parts: Vec<Part>,
            }
            #[derive(Deserialize)]
            struct Part {
                text: Option<String>,
            }

            let body = json!({
                "contents": [{ "role": "user", "parts": [{ "text": request.prompt }] }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "responseSchema": response_schema(),
                    "temperature": 0.2
                }
            });

            let url = format!("{}/{}:generateContent", self.base_url, self.model);
            let resp = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .await?;

            let status = resp.status();
            if !status.is_success() {
                return Err(GenerationError::Status(status));
            }
            let parsed: Resp = resp.json().await?;
            let text: String = parsed
                .candidates
                .into_iter()
                .next()
                .and_then(|c| c.content)
                .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
                .unwrap_or_default();

            parse_structured_output(&text)
        })
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Decode the generator's JSON text and enforce the output contract.
pub fn parse_structured_output(text: &str) -> Result<AnalysisResult, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let raw: AnalysisResult =
        serde_json::from_str(trimmed).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    normalize_result(raw)
}

/// Trim strings, reject blank required fields, keep at most 3 hotspots.
pub fn normalize_result(mut r: AnalysisResult) -> Result<AnalysisResult, GenerationError> {
    for (field, value) in [
        ("summary", &mut r.summary),
        ("advice", &mut r.advice),
        ("depthTrend", &mut r.depth_trend),
        ("seasonalContext", &mut r.seasonal_context),
    ] {
        *value = value.trim().to_string();
        if value.is_empty() {
            return Err(GenerationError::Malformed(format!("{field} is blank")));
        }
    }
    r.hotspots = r
        .hotspots
        .into_iter()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .take(3)
        .collect();
    Ok(r)
}

// ------------------------------------------------------------
// Disabled / test generators
// ------------------------------------------------------------

/// Always `NotConfigured`; used when no API key is available.
pub struct DisabledGenerator;

impl AnalysisGenerator for DisabledGenerator {
    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async { Err(GenerationError::NotConfigured) })
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Always fails with an empty response; drives the stale-fallback path.
pub struct ErrorGenerator;

impl AnalysisGenerator for ErrorGenerator {
    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(async { Err(GenerationError::EmptyResponse) })
    }
    fn name(&self) -> &'static str {
        "error"
    }
}

/// Deterministic generator for tests/local runs.
#[derive(Clone)]
pub struct MockGenerator {
    pub fixed: AnalysisResult,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            fixed: AnalysisResult {
                summary: "Moderate activity along the Sylhet and Chittagong belts (mock).".into(),
                risk_level: RiskLevel::Moderate,
                advice: "Review household earthquake plans.".into(),
                hotspots: vec!["Sylhet".into(), "Chittagong".into()],
                depth_trend: "Mostly shallow events.".into(),
                seasonal_context: "Within typical frequency.".into(),
            },
        }
    }
}

impl AnalysisGenerator for MockGenerator {
    fn generate<'a>(&'a self, _request: &'a GenerationRequest) -> GenerationFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Daily budget
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct DailyCounter {
    day: NaiveDate,
    count: u32,
}

/// Caps real generation calls per UTC day. Only successful calls count.
pub struct BudgetedGenerator<G: AnalysisGenerator> {
    inner: G,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<G: AnalysisGenerator> BudgetedGenerator<G> {
    pub fn new(inner: G, daily_limit: u32) -> Self {
        Self {
            inner,
            daily_limit,
            counter: Mutex::new(DailyCounter {
                day: today(),
                count: 0,
            }),
        }
    }

    fn has_budget(&self) -> bool {
        let mut g = match self.counter.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        let now = today();
        if g.day != now {
            *g = DailyCounter { day: now, count: 0 };
        }
        g.count < self.daily_limit
    }

    fn record_call(&self) {
        let mut g = match self.counter.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        };
        g.count = g.count.saturating_add(1);
    }

    async fn generate_impl(
        &self,
        request: &GenerationRequest,
    ) -> Result<AnalysisResult, GenerationError> {
        if !self.has_budget() {
            return Err(GenerationError::DailyLimit(self.daily_limit));
        }
        let out = self.inner.generate(request).await?;
        self.record_call();
        Ok(out)
    }
}

impl<G: AnalysisGenerator> AnalysisGenerator for BudgetedGenerator<G> {
    fn generate<'a>(&'a self, request: &'a GenerationRequest) -> GenerationFuture<'a> {
        Box::pin(self.generate_impl(request))
    }
    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}
