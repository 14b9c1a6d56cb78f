// src/quake/feed.rs
//! Upstream USGS FDSN event feed.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::types::EventCollection;

pub const DEFAULT_FEED_URL: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Feed unreachable, non-success status, or an undecodable body.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned HTTP {0}")]
    Status(StatusCode),
    #[error("feed body could not be decoded: {0}")]
    Decode(String),
}

/// Fixed query sent to the feed: a bounding box around Bangladesh and its
/// borders, newest first, capped result count, magnitude floor.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub limit: u32,
    pub min_magnitude: f64,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            min_latitude: 20.0,
            max_latitude: 27.0,
            min_longitude: 88.0,
            max_longitude: 93.0,
            limit: 50,
            min_magnitude: 2.5,
        }
    }
}

impl FeedQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("format", "geojson".to_string()),
            ("minlatitude", self.min_latitude.to_string()),
            ("maxlatitude", self.max_latitude.to_string()),
            ("minlongitude", self.min_longitude.to_string()),
            ("maxlongitude", self.max_longitude.to_string()),
            ("orderby", "time".to_string()),
            ("limit", self.limit.to_string()),
            ("minmagnitude", self.min_magnitude.to_string()),
        ]
    }
}

#[async_trait]
pub trait FeedClient: Send + Sync {
    async fn fetch(&self) -> Result<EventCollection, FetchError>;
    fn name(&self) -> &'static str;
}

pub struct UsgsFeed {
    http: reqwest::Client,
    base_url: String,
    query: FeedQuery,
}

impl UsgsFeed {
    pub fn new(base_url: impl Into<String>, query: FeedQuery) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("quake-monitor/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            query,
        })
    }
}

#[async_trait]
impl FeedClient for UsgsFeed {
    async fn fetch(&self) -> Result<EventCollection, FetchError> {
        let resp = self
            .http
            .get(&self.base_url)
            .query(&self.query.to_params())
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "usgs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_query_matches_feed_contract() {
        let params = FeedQuery::default().to_params();
        let get = |k: &str| {
            params
                .iter()
                .find(|(name, _)| *name == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("format"), Some("geojson"));
        assert_eq!(get("minlatitude"), Some("20"));
        assert_eq!(get("maxlatitude"), Some("27"));
        assert_eq!(get("minlongitude"), Some("88"));
        assert_eq!(get("maxlongitude"), Some("93"));
        assert_eq!(get("orderby"), Some("time"));
        assert_eq!(get("limit"), Some("50"));
        assert_eq!(get("minmagnitude"), Some("2.5"));
    }
}
