use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{TX_FEED_URL, USAGE_REPORT_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Per-request timeout applied to every outbound HTTP call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Lower bound of the jittered cooldown between interaction cycles.
    #[serde(default = "default_cooldown_min")]
    pub cooldown_min_secs: f64,
    /// Upper bound (exclusive) of the jittered cooldown.
    #[serde(default = "default_cooldown_max")]
    pub cooldown_max_secs: f64,
    /// Transaction feed queried for recent coin transfers.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,
    /// Usage-tracking endpoint that credits points.
    #[serde(default = "default_usage_url")]
    pub usage_url: String,
}

/// Input file locations, all line-delimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_wallets_file")]
    pub wallets_file: String,
    #[serde(default = "default_proxies_file")]
    pub proxies_file: String,
    #[serde(default = "default_questions_file")]
    pub questions_file: String,
}

fn default_request_timeout() -> u64 {
    30
}

fn default_cooldown_min() -> f64 {
    1.0
}

fn default_cooldown_max() -> f64 {
    3.0
}

fn default_feed_url() -> String {
    TX_FEED_URL.to_string()
}

fn default_usage_url() -> String {
    USAGE_REPORT_URL.to_string()
}

fn default_wallets_file() -> String {
    "wallets.txt".to_string()
}

fn default_proxies_file() -> String {
    "proxies.txt".to_string()
}

fn default_questions_file() -> String {
    "questions.txt".to_string()
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            cooldown_min_secs: default_cooldown_min(),
            cooldown_max_secs: default_cooldown_max(),
            feed_url: default_feed_url(),
            usage_url: default_usage_url(),
        }
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            wallets_file: default_wallets_file(),
            proxies_file: default_proxies_file(),
            questions_file: default_questions_file(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}
