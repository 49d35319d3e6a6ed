#![deny(unsafe_code)]

//! Configuration loading and validation for lxdview.
//!
//! Loads TOML configuration files and validates them. Provides the
//! [`AppConfig`] type as the central configuration structure. Every key is
//! optional; an empty file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default name of the configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "lxdview.toml";

/// Lower bound applied to the refresh interval at the point of use.
pub const MIN_REFRESH_INTERVAL_SECS: u64 = 1;

/// Log levels accepted by `logging.level`.
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// LXD daemon connection and polling.
    #[serde(default)]
    pub lxd: LxdConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for talking to the LXD daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LxdConfig {
    /// Explicit path of the LXD unix socket. Empty means autodetect.
    #[serde(default)]
    pub socket_path: String,

    /// Do not publish the "unsupported environment" warning.
    #[serde(default)]
    pub suppress_unsupported_environment_warning: bool,

    /// Seconds between the end of one refresh cycle and the start of the next.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// List instances, images and networks across all projects.
    #[serde(default)]
    pub all_projects: bool,

    /// Project to list from. Empty means the daemon's default project.
    #[serde(default)]
    pub project: String,
}

impl Default for LxdConfig {
    fn default() -> Self {
        Self {
            socket_path: String::new(),
            suppress_unsupported_environment_warning: false,
            refresh_interval_secs: default_refresh_interval_secs(),
            all_projects: false,
            project: String::new(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    15
}

impl LxdConfig {
    /// The configured socket override, if one is set.
    pub fn socket_override(&self) -> Option<PathBuf> {
        let trimmed = self.socket_path.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(PathBuf::from(trimmed))
        }
    }

    /// The refresh interval, clamped to [`MIN_REFRESH_INTERVAL_SECS`].
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(MIN_REFRESH_INTERVAL_SECS))
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if tokio::fs::try_exists(path).await? {
            Self::load(path).await
        } else {
            debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration back to disk as pretty TOML.
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        let content = self.to_toml()?;
        tokio::fs::write(path, content).await?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Render the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.logging.level.to_ascii_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                VALID_LOG_LEVELS, self.logging.level
            )));
        }
        if self.lxd.all_projects && !self.lxd.project.trim().is_empty() {
            return Err(ConfigError::Validation(
                "lxd.project cannot be combined with lxd.all_projects".to_string(),
            ));
        }
        if self.lxd.socket_path.contains('\0') {
            return Err(ConfigError::Validation(
                "lxd.socket_path must not contain NUL bytes".to_string(),
            ));
        }
        Ok(())
    }
}
