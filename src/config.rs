//! Configuration file support.
//!
//! Configuration is read from TOML. Durations use humantime notation
//! (`"500ms"`, `"30s"`, `"1h"`). Every field has a default, so an empty file
//! is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pool::MAX_POOL_SLOTS;
use crate::{SnapError, Viewport};

pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub default_locale: String,
    pub engine: EngineConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_locale: DEFAULT_LOCALE.to_string(),
            engine: EngineConfig::default(),
            pool: PoolConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// What the idle monitor does when the engine is idle but slots are still checked out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdlePolicy {
    /// Skip the shutdown until every slot has been returned.
    #[default]
    WaitForSlots,
    /// Shut down on the timestamp alone, even with pages checked out.
    Lenient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub headless: bool,
    pub window: Viewport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub launch_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_period: Duration,
    #[serde(with = "humantime_serde")]
    pub idle_poll_interval: Duration,
    pub idle_policy: IdlePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window: Viewport::default(),
            executable: None,
            launch_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            idle_period: Duration::from_secs(60),
            idle_poll_interval: Duration::from_secs(30),
            idle_policy: IdlePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub max_slots: usize,
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    #[serde(with = "humantime_serde")]
    pub release_delay: Duration,
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub admission_timeout: Option<Duration>,
    pub network_idle: NetworkIdleConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_slots: 20,
            settle: Duration::from_millis(2000),
            release_delay: Duration::from_millis(5000),
            admission_timeout: None,
            network_idle: NetworkIdleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkIdleConfig {
    pub max_inflight: usize,
    #[serde(with = "humantime_serde")]
    pub idle_window: Duration,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for NetworkIdleConfig {
    fn default() -> Self {
        Self {
            max_inflight: 5,
            idle_window: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    pub auto_create_namespaces: bool,
    pub default_namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(3600),
            auto_create_namespaces: true,
            default_namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

impl Config {
    /// `$HOME/.config/pagesnap/config.toml`, when a home directory is known.
    pub fn central_config_path() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("pagesnap")
                    .join("config.toml")
            })
    }

    /// Load config with priority: explicit path > central config > defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, SnapError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::central_config_path() {
            Some(central) if central.is_file() => Self::from_file(&central),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, SnapError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SnapError> {
        toml::from_str(raw).map_err(|e| SnapError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), SnapError> {
        if self.default_locale.trim().is_empty() {
            return Err(SnapError::Config(
                "default_locale must not be empty".to_string(),
            ));
        }
        if self.pool.max_slots == 0 {
            return Err(SnapError::Config(
                "pool.max_slots must be at least 1".to_string(),
            ));
        }
        if self.pool.max_slots > MAX_POOL_SLOTS {
            return Err(SnapError::Config(format!(
                "pool.max_slots must be at most {}, got {}",
                MAX_POOL_SLOTS, self.pool.max_slots
            )));
        }
        if self.engine.window.width == 0 || self.engine.window.height == 0 {
            return Err(SnapError::Config(format!(
                "engine.window must have positive dimensions, got {}",
                self.engine.window
            )));
        }
        if self.engine.idle_poll_interval.is_zero() {
            return Err(SnapError::Config(
                "engine.idle_poll_interval must be greater than zero".to_string(),
            ));
        }
        if self.cache.default_namespace.is_empty() {
            return Err(SnapError::Config(
                "cache.default_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
