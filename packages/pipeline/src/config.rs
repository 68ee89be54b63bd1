//! Run configuration.
//!
//! Values come from [`PipelineConfig::default`], optionally overlaid by a
//! TOML file (every key optional), and finally by CLI flags in the binary.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use crime_table_source::csv_year::YEAR_PLACEHOLDER;
use serde::{Deserialize, Serialize};

use crate::orchestrator::DEFAULT_MAX_WORKERS;

/// Environment variable naming a TOML config file to load when `--config`
/// is not given.
pub const CONFIG_ENV_VAR: &str = "CRIME_TABLE_CONFIG";

/// Errors from loading or validating a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has unknown keys.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },

    /// `start_year` is after `end_year`.
    #[error("start year {start} is after end year {end}")]
    InvalidYearRange {
        /// Configured first year.
        start: i32,
        /// Configured last year.
        end: i32,
    },

    /// `max_workers` is zero.
    #[error("max_workers must be at least 1")]
    NoWorkers,

    /// The input template has no `{year}` placeholder.
    #[error("input template {template:?} does not contain {{year}}")]
    MissingYearPlaceholder {
        /// Offending template.
        template: String,
    },
}

/// Everything needed for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// First year to process.
    pub start_year: i32,
    /// Last year to process (inclusive).
    pub end_year: i32,
    /// Upper bound on concurrently processed years. Also capped by the
    /// machine's available parallelism.
    pub max_workers: usize,
    /// Path template for a year's source CSV, containing `{year}`.
    pub input_template: String,
    /// Path of the merged output CSV.
    pub output_path: PathBuf,
    /// Whether to write a leading row index column.
    pub write_index: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_year: 2015,
            end_year: 2025,
            max_workers: DEFAULT_MAX_WORKERS,
            input_template: "data/crimedata_csv_AllNeighbourhoods_{year}.csv".to_string(),
            output_path: PathBuf::from("data/crimedata.csv"),
            write_index: true,
        }
    }
}

impl PipelineConfig {
    /// Parses a TOML document. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] on invalid TOML, wrong value types, or
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Loads a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the config from `explicit` if given, otherwise from the file
    /// named by [`CONFIG_ENV_VAR`], otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a named file cannot be loaded.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }

    /// Checks that the configuration describes a runnable job.
    ///
    /// # Errors
    ///
    /// Returns the first problem found as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_year > self.end_year {
            return Err(ConfigError::InvalidYearRange {
                start: self.start_year,
                end: self.end_year,
            });
        }
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if !self.input_template.contains(YEAR_PLACEHOLDER) {
            return Err(ConfigError::MissingYearPlaceholder {
                template: self.input_template.clone(),
            });
        }
        Ok(())
    }

    /// Inclusive range of years to process.
    #[must_use]
    pub const fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }
}
