//! Configuration module for the Trailmark sync engine.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation and defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration for the sync engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub queue: QueueConfig,
    pub cache: CacheConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

/// Operation queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tasks the queue will hold; enqueues beyond this
    /// are rejected as backpressure.
    pub capacity: usize,
    /// Default retry budget for enqueued tasks.
    pub default_max_retries: u32,
    /// Path of the persisted queue snapshot.
    pub snapshot_path: PathBuf,
}

/// Expiring cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// Total serialized-size budget in bytes.
    pub max_cost_bytes: u64,
    /// Default time-to-live for entries, in seconds.
    pub default_ttl_secs: u64,
    /// Seconds between background expiry sweeps.
    pub sweep_interval_secs: u64,
}

/// Trigger/throttle coordinator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum seconds between sync attempts (manual triggers bypass this).
    pub min_sync_interval_secs: u64,
    /// Seconds between periodic sync ticks while foregrounded.
    pub periodic_interval_secs: u64,
    /// Grace delay after process start before the first sync.
    pub startup_delay_secs: u64,
    /// Grace delay after returning to foreground.
    pub foreground_delay_secs: u64,
    /// Grace delay after network connectivity is restored.
    pub network_restore_delay_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %path.display(), "Using default config: {err}");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/trailmark/sync.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("trailmark")
            .join("sync.yaml")
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            default_max_retries: 3,
            snapshot_path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("trailmark")
                .join("queue.json"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            max_cost_bytes: 8 * 1024 * 1024,
            default_ttl_secs: 600,
            sweep_interval_secs: 300,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_sync_interval_secs: 60,
            periodic_interval_secs: 300,
            startup_delay_secs: 5,
            foreground_delay_secs: 3,
            network_restore_delay_secs: 3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"queue.capacity"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.queue.capacity == 0 {
            errors.push(ValidationError {
                field: "queue.capacity".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.cache.max_entries == 0 {
            errors.push(ValidationError {
                field: "cache.max_entries".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.cache.sweep_interval_secs == 0 {
            errors.push(ValidationError {
                field: "cache.sweep_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.scheduler.periodic_interval_secs < self.scheduler.min_sync_interval_secs {
            errors.push(ValidationError {
                field: "scheduler.periodic_interval_secs".into(),
                message: "must not be shorter than min_sync_interval_secs".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!("must be one of {VALID_LOG_LEVELS:?}"),
            });
        }

        errors
    }
}
