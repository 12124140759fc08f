//! Application configuration management.
//!
//! Settings are layered with figment, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. Environment variables prefixed `DUPESCAN_`, `__` separating nested
//!    keys (`DUPESCAN_PIPELINE__MAX_IN_FLIGHT=64`)
//! 4. Command-line flags, applied by the caller
//!
//! Every tuning knob of the pipeline lives in [`PipelineConfig`], which is
//! passed by value into each stage instead of being read from globals.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::scanner::{DEFAULT_HASH_WIDTH, MAX_HASH_WIDTH, MIN_HASH_WIDTH};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DUPESCAN_";

/// How the final report is produced from the hash file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExtractStrategy {
    /// Re-scan the hash file once per duplicate key; output grouped blocks.
    #[default]
    Seek,
    /// External chunked merge sort of the duplicates file; output sorted records.
    Sort,
}

impl std::fmt::Display for ExtractStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Seek => write!(f, "seek"),
            Self::Sort => write!(f, "sort"),
        }
    }
}

/// Tuning knobs of the duplicate detection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ceiling of simultaneous in-flight hash operations.
    pub max_in_flight: usize,
    /// Worker threads executing hash operations.
    pub io_threads: usize,
    /// Bytes per read while hashing and scanning.
    pub read_chunk_size: usize,
    /// Hex characters kept from each digest.
    ///
    /// Collision odds are about `n^2 / 2 / 16^width` for `n` hashed files;
    /// the default 16 gives roughly 1 in 10^12 at 6,000 candidates.
    pub hash_width: usize,
    /// Records per in-memory chunk of the external sort.
    pub sort_chunk_lines: usize,
    /// Lines each writer buffers before producers block.
    pub write_queue_capacity: usize,
    /// Minimum milliseconds between progress log lines.
    pub progress_interval_ms: u64,
    /// Extraction strategy for the final report.
    pub strategy: ExtractStrategy,
    /// Keep the sizes, hash and duplicates files after a successful run.
    pub keep_intermediate: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 128,
            io_threads: 4,
            read_chunk_size: 64 * 1024,
            hash_width: DEFAULT_HASH_WIDTH,
            sort_chunk_lines: 10_000,
            write_queue_capacity: 1024,
            progress_interval_ms: 1000,
            strategy: ExtractStrategy::Seek,
            keep_intermediate: true,
        }
    }
}

impl PipelineConfig {
    /// Check that every knob is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_in_flight", self.max_in_flight),
            ("io_threads", self.io_threads),
            ("read_chunk_size", self.read_chunk_size),
            ("sort_chunk_lines", self.sort_chunk_lines),
            ("write_queue_capacity", self.write_queue_capacity),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if !(MIN_HASH_WIDTH..=MAX_HASH_WIDTH).contains(&self.hash_width) {
            return Err(ConfigError::Invalid {
                field: "hash_width",
                reason: format!("must be between {MIN_HASH_WIDTH} and {MAX_HASH_WIDTH}"),
            });
        }
        Ok(())
    }

    /// Progress interval as a duration.
    #[must_use]
    pub fn progress_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.progress_interval_ms)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving intermediate files and reports.
    /// `None` selects [`Config::default_output_dir`].
    pub output_dir: Option<PathBuf>,
    /// Pipeline tuning.
    pub pipeline: PipelineConfig,
}

/// Errors loading or validating configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A layer could not be parsed or extracted.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value is out of range.
    #[error("Invalid configuration value `{field}`: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

impl Config {
    /// Build the layered figment for an optional explicit config file.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => figment = figment.merge(Toml::file(path)),
            None => {
                if let Some(path) = Self::config_path() {
                    if path.exists() {
                        log::debug!("Loading config from {}", path.display());
                        figment = figment.merge(Toml::file(path));
                    }
                }
            }
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load defaults, file, and environment, then validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a layer is malformed or a value is invalid.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = file {
            if !path.exists() {
                return Err(ConfigError::Invalid {
                    field: "config",
                    reason: format!("file {} does not exist", path.display()),
                });
            }
        }
        let config: Config = Self::figment(file).extract().map_err(Box::new)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Output directory, falling back to the platform data dir.
    #[must_use]
    pub fn resolved_output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(Self::default_output_dir)
    }

    /// `<data dir>/output-data`, or `./output-data` if no data dir exists.
    #[must_use]
    pub fn default_output_dir() -> PathBuf {
        ProjectDirs::from("com", "dupescan", "dupescan")
            .map(|dirs| dirs.data_dir().join("output-data"))
            .unwrap_or_else(|| PathBuf::from("output-data"))
    }

    /// Platform-specific configuration file path.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "dupescan", "dupescan")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
