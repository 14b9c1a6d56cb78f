// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_daily_limit() -> u32 {
    200
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub enabled: bool,
    /// "gemini" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Real generation calls allowed per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// "ENV" means: read from GEMINI_API_KEY, then API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: default_model(),
            daily_limit: default_daily_limit(),
            api_key: default_api_key(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let cfg: AiConfig = serde_json::from_str(&data)?;
        Ok(cfg.normalized())
    }

    /// File config when present, otherwise defaults resolved from the environment.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default().normalized())
        }
    }

    fn normalized(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();
        if let Ok(model) = env::var("GEMINI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
        if self.api_key.trim().eq_ignore_ascii_case("env") {
            // A missing key is not fatal: the analysis endpoint degrades to
            // its "not configured" report.
            self.api_key = env::var("GEMINI_API_KEY")
                .or_else(|_| env::var("API_KEY"))
                .unwrap_or_default();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[serial_test::serial]
    #[test]
    fn env_marker_resolves_gemini_key_then_fallback() {
        env::remove_var("GEMINI_MODEL");
        env::set_var("GEMINI_API_KEY", "g-key");
        env::set_var("API_KEY", "plain-key");
        assert_eq!(AiConfig::default().normalized().api_key, "g-key");

        env::remove_var("GEMINI_API_KEY");
        assert_eq!(AiConfig::default().normalized().api_key, "plain-key");

        env::remove_var("API_KEY");
        let cfg = AiConfig::default().normalized();
        assert!(!cfg.has_api_key());
    }

    #[serial_test::serial]
    #[test]
    fn file_values_are_normalized() {
        env::remove_var("GEMINI_MODEL");
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"enabled": true, "provider": " Mock ", "api_key": "literal", "timeout_secs": 0}}"#
        )
        .unwrap();
        let cfg = AiConfig::load_from_file(f.path()).unwrap();
        assert_eq!(cfg.provider, "mock");
        assert_eq!(cfg.api_key, "literal");
        assert_eq!(cfg.model, "gemini-2.0-flash");
        assert_eq!(cfg.daily_limit, 200);
        assert_eq!(cfg.timeout_secs, 20);
    }
}
