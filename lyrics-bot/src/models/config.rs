use crate::error::BotError;
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use getset::Getters;
use log::LevelFilter;
use lyrics_client::cache::CacheConfig;
use lyrics_client::deduplication::DeduplicationConfig;
use lyrics_client::provider::lyrics_ovh::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// Keeps `now + ttl` representable
const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Cache and deduplication settings, in whole seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct CacheSettings {
    enabled: bool,
    ttl_secs: u64,
    sweep_interval_secs: u64,
    max_entries: usize,
    fetch_timeout_secs: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 10 * 60,
            sweep_interval_secs: 5 * 60,
            max_entries: 1000,
            fetch_timeout_secs: None,
        }
    }
}

impl CacheSettings {
    pub fn cache_config(&self) -> CacheConfig {
        let ttl = i64::try_from(self.ttl_secs)
            .unwrap_or(MAX_TTL_SECS)
            .min(MAX_TTL_SECS);
        CacheConfig {
            ttl: chrono::Duration::seconds(ttl),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_entries: self.max_entries,
            enabled: self.enabled,
        }
    }

    pub fn deduplication_config(&self) -> DeduplicationConfig {
        DeduplicationConfig {
            request_timeout: self.fetch_timeout_secs.map(Duration::from_secs),
            enabled: self.enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[get = "pub"]
pub struct Config {
    token: String,
    api_url: String,
    log_level: String,
    cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: DEFAULT_BASE_URL.to_string(),
            log_level: "info".to_string(),
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// Defaults, then the yaml file at `path` if present, then `LYRICS_*`
    /// variables (`__` separates nested keys), then the raw `TOKEN` variable
    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("LYRICS_").split("__"))
            .merge(Env::raw().only(&["TOKEN"]))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BotError> {
        Self::from_figment(Self::figment(path))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, BotError> {
        let config: Config = figment.extract()?;
        if config.token.trim().is_empty() {
            return Err(BotError::MissingToken);
        }
        Ok(config)
    }

    pub fn log_level_filter(&self) -> Result<LevelFilter, BotError> {
        self.log_level
            .parse()
            .map_err(|_| BotError::InvalidLogLevel(self.log_level.clone()))
    }
}
