// src/config/mod.rs
//! Runtime configuration, read from the environment (after `.env` is loaded
//! by the binary) plus `config/ai.json` for the generator.

pub mod ai;

use std::path::PathBuf;
use std::time::Duration;

use crate::quake::feed::DEFAULT_FEED_URL;
pub use ai::AiConfig;

pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_CACHE_PREFIX: &str = "CACHE_KEY_PREFIX";
pub const ENV_CACHE_OP_TIMEOUT_MS: &str = "CACHE_OP_TIMEOUT_MS";
pub const ENV_FEED_URL: &str = "USGS_FEED_URL";
pub const ENV_ALERTS_STORE_PATH: &str = "ALERTS_STORE_PATH";
pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";

pub const DEFAULT_ALERTS_STORE_PATH: &str = "state/alert_preferences.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` disables caching (every read is a miss).
    pub redis_url: Option<String>,
    pub cache_prefix: String,
    pub cache_op_timeout: Duration,
    pub feed_url: String,
    /// `None` keeps preferences in memory only.
    pub alerts_store_path: Option<PathBuf>,
    pub ai: AiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let redis_url = non_empty_var(ENV_REDIS_URL);
        if redis_url.is_none() {
            tracing::warn!("REDIS_URL not set; caching disabled");
        }

        let cache_op_timeout = non_empty_var(ENV_CACHE_OP_TIMEOUT_MS)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(250));

        let alerts_store_path = match non_empty_var(ENV_ALERTS_STORE_PATH) {
            Some(v) if v.eq_ignore_ascii_case("memory") => None,
            Some(v) => Some(PathBuf::from(v)),
            None => Some(PathBuf::from(DEFAULT_ALERTS_STORE_PATH)),
        };

        let ai_path = non_empty_var(ENV_AI_CONFIG_PATH)
            .unwrap_or_else(|| ai::DEFAULT_AI_CONFIG_PATH.to_string());
        let ai = AiConfig::load_or_default(&ai_path)?;

        Ok(Self {
            redis_url,
            cache_prefix: non_empty_var(ENV_CACHE_PREFIX).unwrap_or_default(),
            cache_op_timeout,
            feed_url: non_empty_var(ENV_FEED_URL).unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            alerts_store_path,
            ai,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
