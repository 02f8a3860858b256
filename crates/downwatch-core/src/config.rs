//! downwatch.toml configuration parser.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "downwatch.toml";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownwatchConfig {
    pub store: StoreConfig,
    pub probe: ProbeConfig,
    pub runner: RunnerConfig,
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the redb database file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("downwatch.redb"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Connect timeout for a single probe, in seconds.
    pub connect_timeout_secs: u64,
    /// Upper bound on a whole probe once connected, in seconds.
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            user_agent: concat!("downwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Upper bound on probes in flight at once.
    pub max_concurrent_probes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_probes: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub subject: String,
    pub sender_name: String,
    pub sender_address: String,
    pub transport: TransportConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            subject: "Website Availability Status Report".to_string(),
            sender_name: "downwatch".to_string(),
            sender_address: "downwatch@localhost".to_string(),
            transport: TransportConfig::default(),
        }
    }
}

/// Where consolidated reports are delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Write reports to the log only.
    #[default]
    Log,
    /// POST each report as JSON to a URL.
    Webhook { url: String },
}

impl DownwatchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DownwatchConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!(?path, "config loaded");
        Ok(config)
    }

    /// Load an explicit config file, or `downwatch.toml` from the working
    /// directory if it exists, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("no config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.runner.max_concurrent_probes == 0 {
            return Err(ConfigError::Invalid(
                "runner.max_concurrent_probes must be at least 1".to_string(),
            ));
        }
        if self.probe.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "probe.connect_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.probe.request_timeout_secs < self.probe.connect_timeout_secs {
            return Err(ConfigError::Invalid(
                "probe.request_timeout_secs must not be shorter than probe.connect_timeout_secs"
                    .to_string(),
            ));
        }
        if let TransportConfig::Webhook { url } = &self.notify.transport {
            if url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "notify.transport.url must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
