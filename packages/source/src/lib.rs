#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Per-year crime row sources.
//!
//! A [`RowSource`] hands out the raw incidents recorded for one year, in the
//! order they appear at the source. The provided implementation,
//! [`csv_year::CsvYearSource`], reads one CSV file per year from a path
//! template.

pub mod csv_year;
pub mod progress;

use std::path::PathBuf;

use crime_table_crime_models::RawRecord;

/// Errors that can occur while loading a year's rows.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The file could not be opened or read.
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid CSV or a cell could not be decoded.
    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },

    /// The header row lacks one or more required columns.
    #[error("{} is missing required column(s): {}", path.display(), missing.join(", "))]
    MissingColumns {
        /// File that failed.
        path: PathBuf,
        /// Names of the absent columns.
        missing: Vec<String>,
    },
}

/// Supplies the raw rows for a single year.
///
/// Implementations must be `Send + Sync` so one source can serve every
/// year's batch concurrently.
pub trait RowSource: Send + Sync {
    /// Human-readable location of a year's rows, for log messages.
    fn location(&self, year: i32) -> String;

    /// Loads every row recorded for `year`, preserving source order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the year's data cannot be read or lacks
    /// required columns.
    fn load(&self, year: i32) -> Result<Vec<RawRecord>, SourceError>;
}
