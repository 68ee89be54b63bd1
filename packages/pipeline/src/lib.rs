#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Yearly crime CSVs in, one normalized dataset out.
//!
//! Each year's file is loaded through a [`RowSource`], every row is
//! normalized by [`transform::transform`], years run in parallel under the
//! [`orchestrator::Orchestrator`], and the merged dataset is handed to a
//! [`sink::RecordSink`] once every year has succeeded.

pub mod config;
pub mod orchestrator;
pub mod sink;
pub mod transform;

use std::sync::Arc;

use crime_table_source::progress::ProgressCallback;
use crime_table_source::{RowSource, SourceError, csv_year::CsvYearSource};
use strum_macros::{AsRefStr, Display};

use crate::config::{ConfigError, PipelineConfig};
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::sink::{CsvSink, RecordSink, SinkError};
use crate::transform::TransformError;

/// Errors that abort a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The requested year range is empty.
    #[error("invalid year range {start}..={end}")]
    InvalidYearRange {
        /// First requested year.
        start: i32,
        /// Last requested year.
        end: i32,
    },

    /// A year's rows could not be loaded.
    #[error("source for {year} unavailable: {source}")]
    SourceUnavailable {
        /// Year being loaded.
        year: i32,
        /// Underlying error.
        source: SourceError,
    },

    /// A single row could not be normalized.
    #[error("{year} row {row}: {source}")]
    Record {
        /// Year the row belongs to.
        year: i32,
        /// Zero-based row index within the year's file.
        row: usize,
        /// Underlying error.
        source: TransformError,
    },

    /// Completed batches do not line up with the requested years.
    #[error("merge inconsistency for {year}: {reason}")]
    MergeInconsistency {
        /// Year the problem was detected for.
        year: i32,
        /// What went wrong.
        reason: String,
    },

    /// A batch task panicked or was cancelled.
    #[error("worker for {year} failed: {source}")]
    Worker {
        /// Year the task was processing.
        year: i32,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },

    /// The sink failed to persist the dataset.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// The sink task panicked or was cancelled.
    #[error("sink task failed: {0}")]
    SinkTask(#[source] tokio::task::JoinError),
}

/// Failure class of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum ErrorKind {
    /// Configuration failed validation.
    Config,
    /// Empty year range.
    InvalidYearRange,
    /// A year's rows could not be loaded.
    SourceUnavailable,
    /// A row's year/month/day is not a calendar date.
    InvalidDateComponents,
    /// An in-window coordinate could not be reprojected.
    ReprojectionFailure,
    /// Batches did not line up with the requested years.
    MergeInconsistency,
    /// A batch task panicked or was cancelled.
    Worker,
    /// Writing the output failed.
    Sink,
}

impl PipelineError {
    /// Returns the failure class, looking through record-level wrapping.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidYearRange { .. } => ErrorKind::InvalidYearRange,
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::Record { source, .. } => match source {
                TransformError::InvalidDateComponents { .. } => ErrorKind::InvalidDateComponents,
                TransformError::ReprojectionFailure { .. } => ErrorKind::ReprojectionFailure,
            },
            Self::MergeInconsistency { .. } => ErrorKind::MergeInconsistency,
            Self::Worker { .. } => ErrorKind::Worker,
            Self::Sink(_) | Self::SinkTask(_) => ErrorKind::Sink,
        }
    }
}

/// Builds the CSV source, CSV sink, and orchestrator described by `config`
/// and runs them.
///
/// # Errors
///
/// Returns [`PipelineError::Config`] if `config` fails validation, otherwise
/// any error from [`Orchestrator::execute`].
pub async fn run_config(
    config: &PipelineConfig,
    progress: Arc<dyn ProgressCallback>,
) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    let source: Arc<dyn RowSource> = Arc::new(CsvYearSource::new(config.input_template.clone()));
    let sink: Arc<dyn RecordSink> =
        Arc::new(CsvSink::new(config.output_path.clone()).with_index(config.write_index));

    Orchestrator::new(source)
        .with_max_workers(config.max_workers)
        .with_progress(progress)
        .execute(config.years(), sink)
        .await
}

#[cfg(test)]
mod tests {
    use crime_table_source::progress::null_progress;

    use super::*;

    const HEADER: &str = "TYPE,YEAR,MONTH,DAY,HOUR,MINUTE,HUNDRED_BLOCK,NEIGHBOURHOOD,X,Y";

    fn scratch(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn runs_from_config_end_to_end() {
        let dir = scratch("crime_table_run_config_test");
        std::fs::write(
            dir.join("crimes_2020.csv"),
            format!(
                "{HEADER}\n\
                 Theft,2020,6,15,14,30,10XX W GEORGIA ST,Downtown,492000,5459000\n\
                 Mischief,2020,1,2,,,OFFSET TO PROTECT PRIVACY,,,\n"
            ),
        )
        .unwrap();
        std::fs::write(
            dir.join("crimes_2021.csv"),
            format!("{HEADER}\nBreak and Enter Commercial,2021,3,4,7,5,1XX E HASTINGS ST,Strathcona,493000,5458000\n"),
        )
        .unwrap();

        let config = PipelineConfig {
            start_year: 2020,
            end_year: 2021,
            max_workers: 2,
            input_template: dir.join("crimes_{year}.csv").display().to_string(),
            output_path: dir.join("out").join("crimedata.csv"),
            write_index: true,
        };

        let summary = run_config(&config, null_progress()).await.unwrap();
        assert_eq!(summary.years, 2);
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.missing_coordinates, 1);

        let text = std::fs::read_to_string(&config.output_path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            ",TYPE,YEAR,DATE,TIMEOFDAY,NEIGHBOURHOOD,LATITUDE,LONGITUDE"
        );
        assert!(lines[1].starts_with("0,Theft,2020,2020-06-15,Afternoon,Downtown,49.28"));
        assert_eq!(lines[2], "1,Mischief,2020,2020-01-02,Night,,,");
        assert!(lines[3].starts_with("2,Break and Enter Commercial,2021,2021-03-04,Morning,Strathcona,"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_year_file_writes_nothing() {
        let dir = scratch("crime_table_run_config_missing_test");
        std::fs::write(
            dir.join("crimes_2020.csv"),
            format!("{HEADER}\nTheft,2020,6,15,14,30,X,Downtown,492000,5459000\n"),
        )
        .unwrap();

        let config = PipelineConfig {
            start_year: 2020,
            end_year: 2021,
            input_template: dir.join("crimes_{year}.csv").display().to_string(),
            output_path: dir.join("crimedata.csv"),
            ..PipelineConfig::default()
        };

        let err = run_config(&config, null_progress()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_running() {
        let config = PipelineConfig {
            max_workers: 0,
            ..PipelineConfig::default()
        };
        let err = run_config(&config, null_progress()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn record_errors_report_the_transform_failure() {
        let reprojection = PipelineError::Record {
            year: 2020,
            row: 7,
            source: TransformError::ReprojectionFailure {
                x: 492_000.0,
                y: 5_459_000.0,
                source: crime_table_projection::ProjectionError::InvalidZone(0),
            },
        };
        assert_eq!(reprojection.kind(), ErrorKind::ReprojectionFailure);
        assert!(reprojection.to_string().starts_with("2020 row 7: "));

        let date = PipelineError::Record {
            year: 2020,
            row: 0,
            source: TransformError::InvalidDateComponents {
                year: 2020,
                month: 2,
                day: 30,
            },
        };
        assert_eq!(date.kind(), ErrorKind::InvalidDateComponents);
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::InvalidDateComponents.to_string(), "InvalidDateComponents");
        assert_eq!(ErrorKind::Sink.as_ref(), "Sink");
    }
}
