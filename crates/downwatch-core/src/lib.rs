//! downwatch-core — configuration shared by every downwatch crate.

pub mod config;

pub use config::{
    ConfigError, ConfigResult, DownwatchConfig, NotifyConfig, ProbeConfig, RunnerConfig,
    StoreConfig, TransportConfig,
};
