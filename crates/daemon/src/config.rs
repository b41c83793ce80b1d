// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from TOML.
//!
//! Every section has defaults; an absent file yields the default
//! configuration. The overflow strategy is validated at load time so a
//! typo fails startup instead of the first overflow.

use jl_engine::OverflowStrategy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown overflow strategy {0:?} (expected compress, spill, sample, or alert)")]
    UnknownOverflowStrategy(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_persistence: LogPersistenceConfig,
    pub buffers: BuffersConfig,
    pub state: StateConfig,
    pub metrics: MetricsConfig,
    pub runtimes: RuntimesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogPersistenceConfig {
    /// Log directory; empty means `<state_dir>/logs`
    pub directory: String,
    /// Spill directory; empty means `<state_dir>/spill`
    pub spill_directory: String,
    pub retention_days: u32,
    pub rotation_size_bytes: u64,
    pub queue_size: usize,
    pub memory_limit: u64,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
    pub overflow_strategy: String,
}

impl Default for LogPersistenceConfig {
    fn default() -> Self {
        Self {
            directory: String::new(),
            spill_directory: String::new(),
            retention_days: 7,
            rotation_size_bytes: 512 << 20,
            queue_size: 100_000,
            memory_limit: 64 << 20,
            batch_size: 100,
            flush_interval_ms: 100,
            overflow_strategy: "compress".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuffersConfig {
    pub pubsub_buffer_size: usize,
}

impl Default for BuffersConfig {
    fn default() -> Self {
        Self { pubsub_buffer_size: 10_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Connection pool size for the persistence client
    pub pool_size: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self { pool_size: 20 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub default_sample_rate_secs: u64,
    pub storage: MetricsStorageConfig,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_sample_rate_secs: 5,
            storage: MetricsStorageConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsStorageConfig {
    /// Metrics directory; empty means `<state_dir>/metrics`
    pub directory: String,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for MetricsStorageConfig {
    fn default() -> Self {
        Self { directory: String::new(), batch_size: 50, flush_interval_ms: 500 }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuntimesConfig {
    /// Installed runtime images, referenced by workflow `runtime:` fields
    pub available: Vec<String>,
}

impl Config {
    /// Load from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::Read { path: path.to_path_buf(), source: e })?;
            toml::from_str(&text)?
        } else {
            Config::default()
        };
        config.overflow_strategy()?;
        Ok(config)
    }

    /// Parsed overflow strategy, validated against the known set.
    pub fn overflow_strategy(&self) -> Result<OverflowStrategy, ConfigError> {
        OverflowStrategy::parse(&self.log_persistence.overflow_strategy).ok_or_else(|| {
            ConfigError::UnknownOverflowStrategy(self.log_persistence.overflow_strategy.clone())
        })
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.log_persistence.flush_interval_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.metrics.default_sample_rate_secs.max(1))
    }

    pub fn log_dir(&self, state_dir: &Path) -> PathBuf {
        non_empty_path(&self.log_persistence.directory, state_dir, "logs")
    }

    pub fn spill_dir(&self, state_dir: &Path) -> PathBuf {
        non_empty_path(&self.log_persistence.spill_directory, state_dir, "spill")
    }

    pub fn metrics_dir(&self, state_dir: &Path) -> PathBuf {
        non_empty_path(&self.metrics.storage.directory, state_dir, "metrics")
    }
}

fn non_empty_path(configured: &str, state_dir: &Path, default_leaf: &str) -> PathBuf {
    if configured.is_empty() {
        state_dir.join(default_leaf)
    } else {
        PathBuf::from(configured)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
