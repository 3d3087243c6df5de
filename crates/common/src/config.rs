//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Event store (notification backend) configuration.
    pub event_store: EventStoreConfig,
    /// Feed behaviour configuration.
    #[serde(default)]
    pub feed: FeedConfig,
    /// Local state configuration.
    #[serde(default)]
    pub state: StateConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Event store connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EventStoreConfig {
    /// Base URL of the XRPC service (e.g. `https://api.bsky.app`).
    pub service_url: String,
    /// Bearer access token for the authenticated account.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of notifications requested per page.
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
}

/// Feed behaviour configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Distance from the end of the group list that triggers the next page.
    #[serde(default = "default_prefetch_threshold")]
    pub prefetch_threshold: usize,
    /// Number of distinct authors shown inline on a follow group.
    #[serde(default = "default_follow_preview_authors")]
    pub follow_preview_authors: usize,
    /// Refresh interval for polling mode. Polling is disabled when unset.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            prefetch_threshold: default_prefetch_threshold(),
            follow_preview_authors: default_follow_preview_authors(),
            poll_interval_secs: None,
        }
    }
}

/// Local state configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// File holding the persisted "last seen" high-water mark.
    #[serde(default = "default_last_seen_path")]
    pub last_seen_path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            last_seen_path: default_last_seen_path(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_page_limit() -> u32 {
    50
}

const fn default_prefetch_threshold() -> usize {
    5
}

const fn default_follow_preview_authors() -> usize {
    3
}

fn default_last_seen_path() -> PathBuf {
    PathBuf::from("./state/last_seen.json")
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `NOTIFEED_ENV`)
    /// 3. Environment variables with `NOTIFEED_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("NOTIFEED_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("NOTIFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("NOTIFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
