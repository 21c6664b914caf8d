use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::provider::Provider;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MIN_TEMPERATURE: f32 = 0.6;
pub const MAX_TEMPERATURE: f32 = 0.8;
pub const DEFAULT_PURCHASE_DELAY_MS: u64 = 1500;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub provider: Option<String>,
    pub default_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ollama_url: Option<String>,
    pub temperature: Option<f32>,
    /// Most recent messages resent with each demo message, trimmed so the
    /// window opens on a user message. Unset sends them all.
    pub history_limit: Option<usize>,
    pub purchase_delay_ms: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            provider: Some(Provider::Gemini.as_str().to_string()),
            ..Self::default()
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        tracing::debug!(path = %config_path.display(), "config saved");
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    pub fn provider(&self) -> Provider {
        self.provider
            .as_deref()
            .and_then(Provider::from_str)
            .unwrap_or_default()
    }

    pub fn model(&self) -> String {
        self.default_model
            .clone()
            .unwrap_or_else(|| self.provider().default_model().to_string())
    }

    /// Gemini key from the environment first, then the config file
    pub fn gemini_key(&self) -> Option<String> {
        let from_env = ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|k| !k.trim().is_empty());
        self.gemini_key_or(from_env)
    }

    /// Prefer `from_env`, else the stored key. Blank keys count as missing.
    pub fn gemini_key_or(&self, from_env: Option<String>) -> Option<String> {
        from_env
            .or_else(|| self.gemini_api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn ollama_url(&self) -> String {
        self.ollama_url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
    }

    pub fn temperature(&self) -> f32 {
        clamp_temperature(self.temperature.unwrap_or(DEFAULT_TEMPERATURE))
    }

    pub fn purchase_delay_ms(&self) -> u64 {
        self.purchase_delay_ms.unwrap_or(DEFAULT_PURCHASE_DELAY_MS)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("agenti").join("config.json"))
    }
}

/// Keep persona replies varied without drifting out of character
pub fn clamp_temperature(temperature: f32) -> f32 {
    if temperature.is_nan() {
        return DEFAULT_TEMPERATURE;
    }
    temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
}
