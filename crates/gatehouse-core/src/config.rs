//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: where
//! the backend lives, which paths belong to its API, where denied
//! navigations land, and how long startup may wait for a session.
//!
//! Configuration is stored at `~/.config/gatehouse/config.json`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config directory paths
const APP_NAME: &str = "gatehouse";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Startup waits at most this long for the refresh endpoint before
/// continuing as guest.
const DEFAULT_BOOTSTRAP_TIMEOUT_MS: u64 = 5000;

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub api_prefix: String,
    pub refresh_path: String,
    pub public_route: String,
    pub bootstrap_timeout_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4200".to_string(),
            api_prefix: "/api/".to_string(),
            refresh_path: "/api/auth/refresh".to_string(),
            public_route: "/home".to_string(),
            bootstrap_timeout_ms: DEFAULT_BOOTSTRAP_TIMEOUT_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).with_context(|| format!("Invalid base URL: {}", self.base_url))
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let base = self.base_url()?;
        if base.cannot_be_a_base() {
            bail!("Base URL cannot carry paths: {}", self.base_url);
        }
        for (name, value) in [
            ("api_prefix", &self.api_prefix),
            ("refresh_path", &self.refresh_path),
            ("public_route", &self.public_route),
        ] {
            if !value.starts_with('/') {
                bail!("{} must start with '/': {:?}", name, value);
            }
        }
        if self.bootstrap_timeout_ms == 0 {
            bail!("bootstrap_timeout_ms must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("gatehouse-test-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.bootstrap_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load_from(&temp_path("missing")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"base_url":"https://portfolio.example.com","bootstrap_timeout_ms":250}"#)
            .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://portfolio.example.com");
        assert_eq!(config.bootstrap_timeout_ms, 250);
        assert_eq!(config.api_prefix, "/api/");

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("save");
        let config = Config {
            public_route: "/welcome".to_string(),
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = Config {
            base_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_prefix = Config {
            api_prefix: "api/".to_string(),
            ..Config::default()
        };
        assert!(bad_prefix.validate().is_err());

        let zero_timeout = Config {
            bootstrap_timeout_ms: 0,
            ..Config::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
