//! One-CSV-file-per-year row source.
//!
//! The file for a year is found by substituting the year into a path
//! template such as `data/crimedata_csv_AllNeighbourhoods_{year}.csv`.
//! Rows are decoded by header name, so column order does not matter and
//! columns outside [`RAW_COLUMNS`] are ignored.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crime_table_crime_models::{RAW_COLUMNS, RawRecord};
use serde::{Deserialize, Deserializer};

use crate::{RowSource, SourceError};

/// Placeholder replaced by the year in a path template.
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Reads each year's rows from its own CSV file.
#[derive(Debug, Clone)]
pub struct CsvYearSource {
    /// Path template containing [`YEAR_PLACEHOLDER`].
    template: String,
    /// Field delimiter byte (defaults to `,`).
    delimiter: u8,
}

impl CsvYearSource {
    /// Creates a comma-delimited source for the given path template.
    #[must_use]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            delimiter: b',',
        }
    }

    /// Sets the field delimiter (e.g. `b';'`).
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Resolves the file path for `year`.
    #[must_use]
    pub fn path_for(&self, year: i32) -> PathBuf {
        PathBuf::from(self.template.replace(YEAR_PLACEHOLDER, &year.to_string()))
    }

    /// Decodes raw records from CSV text. `path` is only used for error
    /// messages.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::MissingColumns`] if the header lacks a
    /// required column and [`SourceError::Csv`] if any row fails to decode.
    pub fn parse<R: Read>(
        &self,
        reader: R,
        path: &Path,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let csv_err = |source| SourceError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let headers = reader.headers().map_err(csv_err)?;
        let missing: Vec<String> = RAW_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == **col))
            .map(|col| (*col).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::MissingColumns {
                path: path.to_path_buf(),
                missing,
            });
        }

        reader
            .deserialize::<CsvRow>()
            .map(|row| row.map(RawRecord::from).map_err(csv_err))
            .collect()
    }
}

impl RowSource for CsvYearSource {
    fn location(&self, year: i32) -> String {
        self.path_for(year).display().to_string()
    }

    fn load(&self, year: i32) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.path_for(year);
        let file = File::open(&path).map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;

        let records = self.parse(std::io::BufReader::new(file), &path)?;
        log::debug!("Read {} rows from {}", records.len(), path.display());

        Ok(records)
    }
}

/// Row shape as it appears on disk, before conversion to [`RawRecord`].
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "TYPE")]
    crime_type: String,
    #[serde(rename = "YEAR", deserialize_with = "year")]
    year: i32,
    #[serde(rename = "MONTH", deserialize_with = "month")]
    month: u32,
    #[serde(rename = "DAY", deserialize_with = "day")]
    day: u32,
    #[serde(rename = "HOUR", deserialize_with = "hour")]
    hour: Option<u32>,
    #[serde(rename = "NEIGHBOURHOOD")]
    neighbourhood: String,
    #[serde(rename = "X", deserialize_with = "coordinate")]
    x: f64,
    #[serde(rename = "Y", deserialize_with = "coordinate")]
    y: f64,
}

impl From<CsvRow> for RawRecord {
    fn from(row: CsvRow) -> Self {
        Self {
            crime_type: row.crime_type,
            year: row.year,
            month: row.month,
            day: row.day,
            hour: row.hour,
            neighbourhood: row.neighbourhood,
            x: row.x,
            y: row.y,
        }
    }
}

/// Accepts integers written either plainly (`2020`) or as integral floats
/// (`2020.0`), which spreadsheet exports sometimes produce. `column` names
/// the cell in error messages.
fn integral<E, T>(raw: &str, column: &str) -> Result<T, E>
where
    E: serde::de::Error,
    T: TryFrom<i64>,
{
    let value = parse_integral(raw)
        .ok_or_else(|| E::custom(format!("{column}: expected an integer, found {raw:?}")))?;
    T::try_from(value).map_err(|_| E::custom(format!("{column}: integer {value} out of range")))
}

fn year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    integral(&String::deserialize(deserializer)?, "YEAR")
}

fn month<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    integral(&String::deserialize(deserializer)?, "MONTH")
}

fn day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    integral(&String::deserialize(deserializer)?, "DAY")
}

/// Privacy-offset rows leave HOUR blank; those decode as `None`.
fn hour<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if raw.is_empty() {
        return Ok(None);
    }
    integral(&raw, "HOUR").map(Some)
}

#[allow(clippy::cast_possible_truncation)]
fn parse_integral(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let float = raw.parse::<f64>().ok()?;
    (float.is_finite() && float.fract() == 0.0 && float.abs() < 9.0e15).then_some(float as i64)
}

/// Blank coordinate cells become `NaN` so they fail the coordinate gate
/// instead of failing the whole file.
fn coordinate<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    let raw = String::deserialize(deserializer)?;
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|e| D::Error::custom(format!("invalid coordinate {raw:?}: {e}")))
}
