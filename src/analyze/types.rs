// src/analyze/types.rs
use serde::{Deserialize, Serialize};

use crate::quake::Event;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: [&'static str; 4] = ["Low", "Moderate", "High", "Critical"];
}

/// Situation report shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub summary: String,
    pub risk_level: RiskLevel,
    pub advice: String,
    pub hotspots: Vec<String>,
    pub depth_trend: String,
    pub seasonal_context: String,
}

impl AnalysisResult {
    /// Returned for an empty event list.
    pub fn no_activity() -> Self {
        Self {
            summary: "No significant seismic activity detected in the region recently.".into(),
            risk_level: RiskLevel::Low,
            advice: "Standard preparedness applies.".into(),
            hotspots: vec!["None".into()],
            depth_trend: "No recent data to analyze.".into(),
            seasonal_context: "Activity is below average.".into(),
        }
    }

    /// Returned when generation failed and nothing was cached.
    pub fn unavailable() -> Self {
        Self {
            summary: "AI Analysis currently unavailable.".into(),
            risk_level: RiskLevel::Low,
            advice: "Stay alert and follow local guidelines.".into(),
            hotspots: Vec::new(),
            depth_trend: "Unavailable".into(),
            seasonal_context: "Unavailable".into(),
        }
    }

    /// Returned when no generation credentials are configured and nothing was cached.
    pub fn not_configured() -> Self {
        Self {
            summary: "API Key not configured. Cannot generate AI analysis.".into(),
            risk_level: RiskLevel::Low,
            advice: "Please monitor official local news channels.".into(),
            hotspots: Vec::new(),
            depth_trend: "N/A".into(),
            seasonal_context: "N/A".into(),
        }
    }
}

/// The only event fields sent to the generator.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProjectedEvent {
    pub mag: Option<f64>,
    pub place: String,
    pub time: String,
    pub depth: Option<f64>,
}

impl From<&Event> for ProjectedEvent {
    fn from(ev: &Event) -> Self {
        Self {
            mag: ev.magnitude(),
            place: ev.place().to_string(),
            time: ev.occurred_at_iso(),
            depth: ev.depth_km(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_names_are_camel_case() {
        let v = serde_json::to_value(AnalysisResult::unavailable()).unwrap();
        assert_eq!(v["riskLevel"], json!("Low"));
        assert!(v.get("depthTrend").is_some());
        assert!(v.get("seasonalContext").is_some());
    }

    #[test]
    fn unknown_risk_level_is_rejected() {
        let raw = json!({
            "summary": "s", "riskLevel": "Extreme", "advice": "a",
            "hotspots": [], "depthTrend": "d", "seasonalContext": "c"
        });
        assert!(serde_json::from_value::<AnalysisResult>(raw).is_err());
    }
}
