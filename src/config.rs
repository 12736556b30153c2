use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Internal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub schema_version: u32,
    /// STT streaming server base URL (http/https, upgraded to ws for streaming)
    pub stt_url: String,
    /// Token sent in the stream start message (empty = unauthenticated)
    pub stt_api_key: String,
    /// LLM router base URL (OpenAI-compatible)
    pub llm_url: String,
    pub llm_api_key: String,
    /// Model used for all analysis tasks
    pub llm_model: String,
    /// Client identifier for the X-Client-Id header
    pub client_id: String,
    /// Language assumed when a session does not specify one
    pub default_language: String,
    /// Audio sample rate requested from the STT stream
    pub sample_rate: u32,
    /// Port for the HTTP/WebSocket surface
    pub listen_port: u16,
    /// Per-call timeout for LLM requests
    pub llm_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            stt_url: "http://localhost:8001".to_string(),
            stt_api_key: String::new(),
            llm_url: "http://localhost:4000".to_string(),
            llm_api_key: String::new(),
            llm_model: "claude-3-5-sonnet".to_string(),
            client_id: "medscribe".to_string(),
            default_language: "english".to_string(),
            sample_rate: 16_000,
            listen_port: 5000,
            llm_timeout_secs: 45,
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".medscribe"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file or return default, then apply env overrides
    pub fn load_or_default() -> Self {
        let mut config = match Self::load() {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Load config from the default file
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    /// Load config from a specific path, defaulting when the file is absent
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_path()?)
    }

    /// Save config to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply per-field overrides from an environment-like source
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(v) = get("MEDSCRIBE_STT_URL") {
            self.stt_url = v;
        }
        if let Some(v) = get("MEDSCRIBE_STT_API_KEY") {
            self.stt_api_key = v;
        }
        if let Some(v) = get("MEDSCRIBE_LLM_URL") {
            self.llm_url = v;
        }
        if let Some(v) = get("MEDSCRIBE_LLM_API_KEY") {
            self.llm_api_key = v;
        }
        if let Some(v) = get("MEDSCRIBE_LLM_MODEL") {
            self.llm_model = v;
        }
        if let Some(v) = get("MEDSCRIBE_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.listen_port = port,
                Err(_) => debug!("Ignoring invalid MEDSCRIBE_PORT value: {}", v),
            }
        }
    }
}
