//! Application configuration management.
//!
//! Configuration is stored at `~/.config/precache/config.json` and covers the
//! host side only: where assets are fetched from, where caches live, HTTP
//! timeout, install retry policy and logging. The cache name and asset list
//! are fixed in [`crate::manifest`] and cannot be configured.
//!
//! `PRECACHE_ORIGIN` and `PRECACHE_CACHE_DIR` override the file values.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::network::client::DEFAULT_TIMEOUT_SECS;
use crate::worker::{InstallPolicy, DEFAULT_INSTALL_ATTEMPTS, DEFAULT_INSTALL_BACKOFF_MS};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "precache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Origin used when none is configured
const DEFAULT_ORIGIN: &str = "http://localhost:8000";

pub const ENV_ORIGIN: &str = "PRECACHE_ORIGIN";
pub const ENV_CACHE_DIR: &str = "PRECACHE_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL that root-relative asset paths resolve against
    pub origin: String,
    /// Storage root; defaults to the platform cache directory
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub install_max_attempts: u32,
    pub install_backoff_ms: u64,
    /// Directory for a daily-rolling log file, in addition to stderr
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            cache_dir: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            install_max_attempts: DEFAULT_INSTALL_ATTEMPTS,
            install_backoff_ms: DEFAULT_INSTALL_BACKOFF_MS,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = lookup(ENV_ORIGIN).filter(|v| !v.is_empty()) {
            self.origin = origin;
        }
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.is_empty()) {
            self.cache_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin).with_context(|| format!("Invalid origin URL: {}", self.origin))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn install_policy(&self) -> InstallPolicy {
        InstallPolicy {
            max_attempts: self.install_max_attempts,
            initial_backoff: Duration::from_millis(self.install_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.install_policy(), InstallPolicy::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            origin: "https://quotes.example.org".to_string(),
            install_max_attempts: 5,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"origin": "https://elm.example"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.origin, "https://elm.example");
        assert_eq!(config.install_max_attempts, DEFAULT_INSTALL_ATTEMPTS);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(|key| match key {
            ENV_ORIGIN => Some("https://override.example".to_string()),
            ENV_CACHE_DIR => Some("/tmp/precache-test".to_string()),
            _ => None,
        });
        assert_eq!(config.origin, "https://override.example");
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/precache-test"));
    }

    #[test]
    fn test_empty_env_values_ignored() {
        let mut config = Config::default();
        config.apply_env(|_| Some(String::new()));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let config = Config {
            origin: "not a url".to_string(),
            ..Config::default()
        };
        assert!(config.origin_url().is_err());
    }
}
