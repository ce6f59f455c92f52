//! Configuration loading and typed config structures for Herald.
//!
//! The canonical configuration lives in `herald-config.yaml` next to the
//! host binary. This module defines strongly-typed structs that mirror the
//! YAML structure and a loader that reads the file and applies environment
//! overrides. Every field has a default, so an empty file is valid.

use std::path::Path;

use serde::Deserialize;

use crate::scheduler::{MAX_POLL_INTERVAL_MS, MIN_POLL_INTERVAL_MS};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HeraldConfig {
    /// Queue, dedup, batching, and RNG settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Poll interval settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Settings for the reference host binary.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl HeraldConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `HERALD_POLL_INTERVAL_MS` overrides `scheduler.poll_interval_ms`
    /// - `HERALD_SEED` overrides `engine.seed`
    /// - `HERALD_LOG_LEVEL` overrides `logging.level`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. Environment overrides are
    /// not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values with environment variables when set and parseable.
    /// Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ms) = env_parse::<u64>("HERALD_POLL_INTERVAL_MS") {
            self.scheduler.poll_interval_ms = ms;
        }
        if let Some(seed) = env_parse::<u32>("HERALD_SEED") {
            self.engine.seed = Some(seed);
        }
        if let Ok(level) = std::env::var("HERALD_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Engine behavior configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Window in which a re-offered id is suppressed, in milliseconds.
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,

    /// How long notifications accumulate before a flush, in milliseconds.
    #[serde(default = "default_notification_batch_ms")]
    pub notification_batch_ms: u64,

    /// Maximum titles listed in a collapsed notification summary.
    #[serde(default = "default_summary_title_limit")]
    pub summary_title_limit: usize,

    /// RNG seed. When absent the host clock seeds the generator.
    #[serde(default)]
    pub seed: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: default_dedup_window_ms(),
            notification_batch_ms: default_notification_batch_ms(),
            summary_title_limit: default_summary_title_limit(),
            seed: None,
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Requested poll interval in milliseconds. Clamped to
    /// `[200, 10000]` when applied.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether the scheduler starts ticking as soon as it is built.
    #[serde(default = "default_true")]
    pub autostart: bool,
}

impl SchedulerConfig {
    /// The configured interval after clamping.
    pub fn clamped_interval_ms(&self) -> u64 {
        self.poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            autostart: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Settings for the reference host binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DemoConfig {
    /// How long the demo runs before shutting down, in seconds.
    #[serde(default = "default_run_seconds")]
    pub run_seconds: u64,

    /// How long a shown choice stays up before the demo answers it, in
    /// milliseconds.
    #[serde(default = "default_auto_resolve_ms")]
    pub auto_resolve_ms: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            run_seconds: default_run_seconds(),
            auto_resolve_ms: default_auto_resolve_ms(),
        }
    }
}

const fn default_dedup_window_ms() -> u64 {
    1_000
}

const fn default_notification_batch_ms() -> u64 {
    500
}

const fn default_summary_title_limit() -> usize {
    5
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_log_level() -> String {
    String::from("info")
}

const fn default_run_seconds() -> u64 {
    15
}

const fn default_auto_resolve_ms() -> u64 {
    1_500
}

const fn default_true() -> bool {
    true
}
