use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use wksync_api::client::DEFAULT_BASE_URL;
use wksync_api::limiter::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW};
use wksync_core::CollectionSpec;

const APP_DIR: &str = "wksync";
const CONFIG_FILE: &str = "wksync.toml";
const TOKEN_FILE: &str = "token.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "default_collections")]
    pub collections: Vec<CollectionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window_secs: DEFAULT_WINDOW.as_secs(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: default_cache_dir(),
            token_file: default_token_file(),
            rate_limit: RateLimitConfig::default(),
            collections: default_collections(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_token_file() -> PathBuf {
    config_dir().join(TOKEN_FILE)
}

fn default_collections() -> Vec<CollectionSpec> {
    vec![
        CollectionSpec::new("assignments", "/assignments").with_id_filter("ids"),
        CollectionSpec::new("review_statistics", "/review_statistics").with_id_filter("ids"),
        CollectionSpec::new("subjects", "/subjects").with_id_filter("ids"),
    ]
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| {
            format!(
                "config not found at {} (run `wksync init` first)",
                path.display()
            )
        })?;
        let config: Self = toml::from_str(&content).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn find_collection(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_secs == 0 {
            anyhow::bail!("rate_limit.max_requests and rate_limit.window_secs must be positive");
        }
        for (i, c) in self.collections.iter().enumerate() {
            if !wksync_core::store::is_valid_key(&c.name) {
                anyhow::bail!("collection name '{}' is not a valid cache key", c.name);
            }
            if self.collections[..i].iter().any(|other| other.name == c.name) {
                anyhow::bail!("collection '{}' is configured twice", c.name);
            }
        }
        Ok(())
    }
}
