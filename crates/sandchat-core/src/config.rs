//! Configuration management for Sandchat
//!
//! Handles loading and saving the client configuration (backend endpoint,
//! request limits) from the platform config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the backend fronting the chat and sandbox endpoints
    pub api_base_url: String,
    /// Timeout for non-streaming requests, in seconds
    pub request_timeout_secs: u64,
    /// Maximum automatically continued generation steps per user turn
    pub max_turn_steps: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            max_turn_steps: 4,
        }
    }
}

impl Config {
    /// Check the configured endpoint is a usable HTTP(S) URL
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.api_base_url)
            .map_err(|e| Error::Config(format!("invalid api_base_url: {}", e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config(
                "api_base_url must use http or https".to_string(),
            ));
        }
        Ok(())
    }

    fn base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }

    /// Streaming chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base())
    }

    /// One-shot sandbox initialization endpoint for a session
    pub fn initialize_url(&self, session_id: &str) -> String {
        format!("{}/api/sessions/{}/initialize", self.base(), session_id)
    }

    /// Multipart upload endpoint (session id goes in the query string)
    pub fn upload_url(&self) -> String {
        format!("{}/api/sandboxes/upload", self.base())
    }
}

/// Loads the config file, creating it with defaults on first run
pub struct ConfigManager {
    config: Config,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from the default platform config path
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_config_path())
    }

    /// Load from a specific path (used by tests)
    pub fn with_path(config_path: PathBuf) -> Result<Self> {
        let config = if config_path.exists() {
            let raw = std::fs::read_to_string(&config_path)?;
            toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("invalid config {}: {}", config_path.display(), e)))?
        } else {
            Config::default()
        };

        Ok(Self { config, config_path })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Write the current configuration back to disk
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(&self.config)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(&self.config_path, raw)?;
        Ok(())
    }

    /// Default config file location
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".sandchat"))
            .join("sandchat")
            .join("config.toml")
    }

    /// Directory for persisted client state (session id, logs)
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".sandchat"))
            .join("sandchat")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_endpoints() {
        let config = Config::default();
        assert_eq!(config.chat_url(), "http://localhost:3000/api/chat");
        assert_eq!(
            config.initialize_url("abc"),
            "http://localhost:3000/api/sessions/abc/initialize"
        );
        assert_eq!(
            config.upload_url(),
            "http://localhost:3000/api/sandboxes/upload"
        );
    }

    #[test]
    fn test_trailing_slash_is_ignored() {
        let config = Config {
            api_base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.chat_url(), "https://example.com/api/chat");
    }

    #[test]
    fn test_validate_rejects_non_http_urls() {
        assert!(Config::default().validate().is_ok());

        let bad_scheme = Config {
            api_base_url: "ftp://example.com".to_string(),
            ..Default::default()
        };
        assert!(bad_scheme.validate().is_err());

        let not_a_url = Config {
            api_base_url: "localhost:3000".to_string(),
            ..Default::default()
        };
        assert!(not_a_url.validate().is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut manager = ConfigManager::with_path(path.clone()).unwrap();
        manager.config_mut().api_base_url = "http://10.0.0.1:8080".to_string();
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path).unwrap();
        assert_eq!(reloaded.config().api_base_url, "http://10.0.0.1:8080");
        assert_eq!(reloaded.config().max_turn_steps, 4);
    }
}
