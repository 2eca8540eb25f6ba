//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the cache invalidation interval, the GitHub API root and
//! the account shown before any selection is made.
//!
//! Configuration is stored at `~/.config/repostalker/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "repostalker";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "GITHUB_API_URL";

/// Environment variable overriding `default_user`
pub const DEFAULT_USER_ENV: &str = "REPOSTALKER_DEFAULT_USER";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub cache_invalidation_interval_ms: Option<i64>,
    pub api_base_url: Option<String>,
    pub default_user: Option<String>,
}

impl Config {
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

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Replace file values with non-empty values from `lookup`, usually `std::env::var`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        if let Some(url) = non_empty(API_URL_ENV) {
            debug!(url = %url, "API base URL overridden from environment");
            self.api_base_url = Some(url);
        }
        if let Some(user) = non_empty(DEFAULT_USER_ENV) {
            self.default_user = Some(user);
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

/// User settings consulted by the sync interactor.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The stored cache invalidation interval in milliseconds, or `default_ms`
    /// if none has been stored.
    async fn invalidation_interval_ms(&self, default_ms: i64) -> Result<i64>;

    async fn set_invalidation_interval_ms(&self, interval_ms: i64) -> Result<()>;
}

/// `SettingsStore` over a `Config` file. Every change is written through.
pub struct ConfigStore {
    path: PathBuf,
    config: Mutex<Config>,
}

impl ConfigStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = Config::load_from(&path)?;
        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    pub fn config(&self) -> Config {
        self.config.lock().clone()
    }
}

#[async_trait]
impl SettingsStore for ConfigStore {
    async fn invalidation_interval_ms(&self, default_ms: i64) -> Result<i64> {
        Ok(self
            .config
            .lock()
            .cache_invalidation_interval_ms
            .unwrap_or(default_ms))
    }

    async fn set_invalidation_interval_ms(&self, interval_ms: i64) -> Result<()> {
        let mut config = self.config.lock();
        let mut updated = config.clone();
        updated.cache_invalidation_interval_ms = Some(interval_ms);
        updated
            .save_to(&self.path)
            .context("Failed to store cache invalidation interval")?;
        *config = updated;
        debug!(interval_ms, "Stored cache invalidation interval");
        Ok(())
    }
}
