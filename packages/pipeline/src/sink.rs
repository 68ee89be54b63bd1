//! Output sinks for the merged dataset.
//!
//! [`CsvSink`] writes the whole dataset as one CSV file. The file is built at
//! a temporary sibling path and renamed into place once complete, so a
//! failed run never leaves a truncated dataset behind.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crime_table_crime_models::{NormalizedRecord, OUTPUT_COLUMNS};

/// Date format used for the `DATE` column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors that can occur while persisting the dataset.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Creating, writing, or renaming the output file failed.
    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The CSV encoder failed.
    #[error("CSV error writing {}: {source}", path.display())]
    Csv {
        /// Path being written.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
}

/// Consumes the final ordered dataset in one call.
pub trait RecordSink: Send + Sync {
    /// Human-readable destination, for log messages.
    fn location(&self) -> String;

    /// Persists every record, returning the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the records cannot be persisted.
    fn write(&self, records: &[NormalizedRecord]) -> Result<u64, SinkError>;
}

/// Writes the dataset to a single CSV file.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
    /// Whether to prepend an unnamed, zero-based row index column.
    write_index: bool,
}

impl CsvSink {
    /// Creates a sink for `path` that writes a leading row index.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_index: true,
        }
    }

    /// Enables or disables the leading row index column.
    #[must_use]
    pub const fn with_index(mut self, write_index: bool) -> Self {
        self.write_index = write_index;
        self
    }

    /// Output file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encodes `records` as CSV into `writer`.
    ///
    /// # Errors
    ///
    /// Returns a [`csv::Error`] if encoding or writing fails.
    pub fn encode<W: Write>(
        &self,
        writer: W,
        records: &[NormalizedRecord],
    ) -> Result<u64, csv::Error> {
        let mut csv = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = Vec::with_capacity(OUTPUT_COLUMNS.len() + 1);
        if self.write_index {
            header.push("");
        }
        header.extend(OUTPUT_COLUMNS);
        csv.write_record(&header)?;

        let mut row: Vec<String> = Vec::with_capacity(header.len());
        let mut written = 0u64;
        for (index, record) in records.iter().enumerate() {
            row.clear();
            if self.write_index {
                row.push(index.to_string());
            }
            row.push(record.crime_type.clone());
            row.push(record.year.to_string());
            row.push(record.date.format(DATE_FORMAT).to_string());
            row.push(record.time_of_day.to_string());
            row.push(record.neighbourhood.clone());
            row.push(record.latitude().map(|v| v.to_string()).unwrap_or_default());
            row.push(record.longitude().map(|v| v.to_string()).unwrap_or_default());
            csv.write_record(&row)?;
            written += 1;
        }

        csv.flush()?;
        Ok(written)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_via_temp(&self, temp: &Path, records: &[NormalizedRecord]) -> Result<u64, SinkError> {
        let io_err = |source| SinkError::Io {
            path: temp.to_path_buf(),
            source,
        };

        let file = File::create(temp).map_err(io_err)?;
        let written = self
            .encode(std::io::BufWriter::new(file), records)
            .map_err(|source| SinkError::Csv {
                path: temp.to_path_buf(),
                source,
            })?;

        std::fs::rename(temp, &self.path).map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })?;

        Ok(written)
    }
}

impl RecordSink for CsvSink {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn write(&self, records: &[NormalizedRecord]) -> Result<u64, SinkError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| SinkError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp = self.temp_path();
        let result = self.write_via_temp(&temp, records);
        if result.is_err() {
            let _ = std::fs::remove_file(&temp);
        }

        if let Ok(written) = &result {
            log::info!("Wrote {written} rows to {}", self.path.display());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_table_crime_models::{Coordinates, TimeOfDay};

    use super::*;

    fn record(crime_type: &str, coordinates: Option<Coordinates>) -> NormalizedRecord {
        NormalizedRecord {
            crime_type: crime_type.to_string(),
            year: 2020,
            date: NaiveDate::from_ymd_opt(2020, 6, 15).unwrap(),
            time_of_day: TimeOfDay::Afternoon,
            neighbourhood: "Downtown".to_string(),
            coordinates,
        }
    }

    fn encode(sink: &CsvSink, records: &[NormalizedRecord]) -> String {
        let mut buf = Vec::new();
        sink.encode(&mut buf, records).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn writes_header_and_index() {
        let records = vec![
            record(
                "Theft",
                Some(Coordinates {
                    latitude: 49.25,
                    longitude: -123.5,
                }),
            ),
            record("Mischief", None),
        ];
        let text = encode(&CsvSink::new("out.csv"), &records);

        assert_eq!(
            text,
            ",TYPE,YEAR,DATE,TIMEOFDAY,NEIGHBOURHOOD,LATITUDE,LONGITUDE\n\
             0,Theft,2020,2020-06-15,Afternoon,Downtown,49.25,-123.5\n\
             1,Mischief,2020,2020-06-15,Afternoon,Downtown,,\n"
        );
    }

    #[test]
    fn index_can_be_disabled() {
        let text = encode(
            &CsvSink::new("out.csv").with_index(false),
            &[record("Theft", None)],
        );
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("TYPE,YEAR,DATE,TIMEOFDAY,NEIGHBOURHOOD,LATITUDE,LONGITUDE")
        );
        assert_eq!(
            lines.next(),
            Some("Theft,2020,2020-06-15,Afternoon,Downtown,,")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn quotes_fields_with_commas() {
        let text = encode(
            &CsvSink::new("out.csv").with_index(false),
            &[record("Vehicle Collision or Pedestrian Struck (with Injury), Other", None)],
        );
        assert!(text.contains("\"Vehicle Collision or Pedestrian Struck (with Injury), Other\""));
    }

    #[test]
    fn empty_dataset_is_header_only() {
        let text = encode(&CsvSink::new("out.csv"), &[]);
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn writes_file_and_creates_parent() {
        let dir = std::env::temp_dir().join("crime_table_csv_sink_test");
        let _ = std::fs::remove_dir_all(&dir);

        let path = dir.join("nested").join("crimedata.csv");
        let sink = CsvSink::new(&path);
        let written = sink.write(&[record("Theft", None)]).unwrap();

        assert_eq!(written, 1);
        assert!(path.exists());
        assert!(!dir.join("nested").join("crimedata.csv.tmp").exists());
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(",TYPE,YEAR"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn temp_path_is_sibling() {
        let sink = CsvSink::new("data/crimedata.csv");
        assert_eq!(sink.temp_path(), PathBuf::from("data/crimedata.csv.tmp"));
    }
}
