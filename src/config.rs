//! Application-level configuration loading: rate-limit tiers, catalog and locking knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, DurationSeconds, serde_as};
use tracing::{info, warn};

use crate::dao::models::{CompetitionEntity, UserEntity};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PUZZLE_ARENA_CONFIG_PATH";
/// Upper bound applied to the catalog request timeout.
const MAX_CATALOG_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Submission cooldown tiers.
    pub rate_limit: RateLimitConfig,
    /// Catalog client settings.
    pub catalog: CatalogConfig,
    /// Attempt lock settings.
    pub locking: LockingConfig,
    /// Seed rows for the embedded store.
    pub directory: DirectoryConfig,
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Two escalating thresholds, each pairing an attempt count with a cooldown.
pub struct RateLimitConfig {
    /// Attempts after which the first cooldown applies.
    pub attempts_threshold_1: u32,
    /// Wait imposed by the first tier.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "cooldown_1_secs")]
    pub cooldown_1: Duration,
    /// Attempts after which the second cooldown applies.
    pub attempts_threshold_2: u32,
    /// Wait imposed by the second tier.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "cooldown_2_secs")]
    pub cooldown_2: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            attempts_threshold_1: 3,
            cooldown_1: Duration::from_secs(3 * 60),
            attempts_threshold_2: 5,
            cooldown_2: Duration::from_secs(5 * 60),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Settings for the HTTP client talking to catalog servers.
pub struct CatalogConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "request_timeout_secs")]
    request_timeout: Duration,
    /// How long a generated puzzle input is served from memory.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(rename = "input_cache_ttl_secs")]
    pub input_cache_ttl: Duration,
}

impl CatalogConfig {
    /// Catalog settings with the given request timeout and the default cache lifetime.
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            ..Self::default()
        }
    }

    /// Per-request timeout, capped at 30 seconds.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout.min(MAX_CATALOG_TIMEOUT)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            request_timeout: MAX_CATALOG_TIMEOUT,
            input_cache_ttl: Duration::from_secs(30 * 60),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
/// Bounds on waiting for exclusive access to an attempt.
pub struct LockingConfig {
    /// Longest wait for one acquisition of an attempt lock.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "lock_timeout_ms")]
    pub lock_timeout: Duration,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(5_000),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Directory rows preloaded into the embedded store.
pub struct DirectoryConfig {
    /// Competitions known to the embedded store.
    pub competitions: Vec<CompetitionEntity>,
    /// Participants known to the embedded store.
    pub users: Vec<UserEntity>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        threshold_1 = config.rate_limit.attempts_threshold_1,
                        threshold_2 = config.rate_limit.attempts_threshold_2,
                        competitions = config.directory.competitions.len(),
                        users = config.directory.users.len(),
                        "loaded application config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document; omitted sections keep their defaults.
    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
