// src/quake/types.rs
//! USGS GeoJSON shapes. Only the fields the core logic reads are typed; every
//! other member is kept in `extra` so responses round-trip unchanged.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventProperties {
    #[serde(default)]
    pub mag: Option<f64>,
    #[serde(default)]
    pub place: Option<String>,
    /// Occurrence time, epoch milliseconds.
    pub time: i64,
    /// Last revision time, epoch milliseconds.
    pub updated: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Geometry {
    #[serde(rename = "type", default = "point")]
    pub kind: String,
    /// longitude, latitude, depth (km)
    pub coordinates: Vec<f64>,
}

fn point() -> String {
    "Point".to_string()
}

fn feature() -> String {
    "Feature".to_string()
}

fn feature_collection() -> String {
    "FeatureCollection".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    #[serde(rename = "type", default = "feature")]
    pub kind: String,
    pub id: String,
    pub properties: EventProperties,
    pub geometry: Geometry,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    pub fn magnitude(&self) -> Option<f64> {
        self.properties.mag
    }

    pub fn place(&self) -> &str {
        self.properties.place.as_deref().unwrap_or_default()
    }

    pub fn depth_km(&self) -> Option<f64> {
        self.geometry.coordinates.get(2).copied()
    }

    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.properties.time).single()
    }

    /// ISO-8601 occurrence time with millisecond precision, e.g. `2024-05-01T10:00:00.000Z`.
    pub fn occurred_at_iso(&self) -> String {
        self.occurred_at()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Identifier plus last-updated stamp. Changes when a new event appears at
    /// the head of the feed or when upstream revises the head event.
    pub fn signature(&self) -> String {
        format!("{}-{}", self.id, self.properties.updated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FeedMetadata {
    #[serde(default)]
    pub generated: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventCollection {
    #[serde(rename = "type", default = "feature_collection")]
    pub kind: String,
    #[serde(default)]
    pub metadata: FeedMetadata,
    #[serde(default)]
    pub features: Vec<Event>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
}

impl EventCollection {
    pub fn new(features: Vec<Event>) -> Self {
        let metadata = FeedMetadata {
            count: Some(features.len() as u64),
            ..FeedMetadata::default()
        };
        Self {
            kind: feature_collection(),
            metadata,
            features,
            bbox: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Stable sort, occurrence time descending.
    pub fn sort_freshest_first(&mut self) {
        self.features
            .sort_by(|a, b| b.properties.time.cmp(&a.properties.time));
    }
}

#[cfg(test)]
pub(crate) fn sample_event(id: &str, time: i64, updated: i64) -> Event {
    Event {
        kind: feature(),
        id: id.to_string(),
        properties: EventProperties {
            mag: Some(4.5),
            place: Some(format!("10 km NE of {id}")),
            time,
            updated,
            extra: Map::new(),
        },
        geometry: Geometry {
            kind: point(),
            coordinates: vec![90.4, 23.8, 10.0],
        },
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn usgs_feature_round_trips_passthrough_fields() {
        let raw = json!({
            "type": "Feature",
            "id": "us7000abcd",
            "properties": {
                "mag": 4.7, "place": "25 km SSE of Sylhet, Bangladesh",
                "time": 1714557600000_i64, "updated": 1714558000000_i64,
                "tsunami": 0, "magType": "mb", "title": "M 4.7 - Sylhet"
            },
            "geometry": { "type": "Point", "coordinates": [91.9, 24.7, 35.0] }
        });
        let ev: Event = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(ev.depth_km(), Some(35.0));
        assert_eq!(ev.signature(), "us7000abcd-1714558000000");
        assert_eq!(ev.occurred_at_iso(), "2024-05-01T10:00:00.000Z");
        assert_eq!(serde_json::to_value(&ev).unwrap(), raw);
    }

    #[test]
    fn null_magnitude_and_place_are_tolerated() {
        let raw = json!({
            "id": "x", "properties": { "mag": null, "place": null, "time": 0, "updated": 0 },
            "geometry": { "coordinates": [0.0, 0.0] }
        });
        let ev: Event = serde_json::from_value(raw).unwrap();
        assert_eq!(ev.magnitude(), None);
        assert_eq!(ev.place(), "");
        assert_eq!(ev.depth_km(), None);
    }

    #[test]
    fn sort_puts_latest_first() {
        let mut c = EventCollection::new(vec![
            sample_event("old", 1_000, 1_000),
            sample_event("new", 3_000, 3_000),
            sample_event("mid", 2_000, 2_000),
        ]);
        c.sort_freshest_first();
        let ids: Vec<_> = c.features.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
