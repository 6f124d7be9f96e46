//! Configuration management module
//!
//! Handles loading, validation, and management of application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::terminal::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECONDS, ManagerOptions, RequestSettings};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Logging level
    pub log_level: String,

    /// File-based logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Terminal server configuration
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// HTTP base URL of the server
    pub base_url: String,

    /// WebSocket base URL; derived from `base_url` when unset
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Server token
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LogConfig {
    /// Path of the daily-rolling log file; stderr only when unset
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log: LogConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_url: None,
            token: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        // REMOTE_TERM_LOG_LEVEL - logging level
        if let Ok(log_level) = env::var("REMOTE_TERM_LOG_LEVEL") {
            self.log_level = log_level;
        }

        // REMOTE_TERM_LOG_FILE_PATH - logging destination file
        if let Ok(file_path) = env::var("REMOTE_TERM_LOG_FILE_PATH") {
            if !file_path.trim().is_empty() {
                self.log.file_path = Some(file_path);
            }
        }

        // REMOTE_TERM_BASE_URL - server base URL
        if let Ok(base_url) = env::var("REMOTE_TERM_BASE_URL") {
            self.server.base_url = base_url;
        }

        // REMOTE_TERM_WS_URL - WebSocket base URL
        if let Ok(ws_url) = env::var("REMOTE_TERM_WS_URL") {
            self.server.ws_url = Some(ws_url);
        }

        // REMOTE_TERM_TOKEN - server token
        if let Ok(token) = env::var("REMOTE_TERM_TOKEN") {
            self.server.token = Some(token);
        }

        // REMOTE_TERM_TIMEOUT_SECONDS - request timeout
        if let Ok(timeout) = env::var("REMOTE_TERM_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.server.timeout_seconds = value;
            }
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Load configuration, using defaults when the file does not exist.
    ///
    /// A file that exists but cannot be read, parsed or validated is an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            return Self::load_from_file(path);
        }

        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.timeout_seconds == 0 {
            anyhow::bail!("Timeout must be greater than 0");
        }

        if !self.server.base_url.starts_with("http://")
            && !self.server.base_url.starts_with("https://")
        {
            anyhow::bail!("Invalid base URL: {}", self.server.base_url);
        }

        if let Some(ws_url) = &self.server.ws_url {
            if !ws_url.starts_with("ws://") && !ws_url.starts_with("wss://") {
                anyhow::bail!("Invalid WebSocket URL: {}", ws_url);
            }
        }

        if let Some(file_path) = &self.log.file_path {
            if file_path.trim().is_empty() {
                anyhow::bail!("Log file path must not be empty");
            }
        }

        Ok(())
    }

    /// Request settings derived from the server section
    pub fn request_settings(&self) -> RequestSettings {
        RequestSettings {
            token: self.server.token.clone(),
            headers: self.server.headers.clone(),
            timeout_seconds: Some(self.server.timeout_seconds),
        }
    }

    /// Terminal manager options derived from the server section
    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            base_url: Some(self.server.base_url.clone()),
            ws_url: self.server.ws_url.clone(),
            settings: Some(self.request_settings()),
        }
    }

    /// Display formatted configuration
    pub fn display(&self) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        println!("Current configuration:");
        println!("{}", content);
        Ok(())
    }
}
