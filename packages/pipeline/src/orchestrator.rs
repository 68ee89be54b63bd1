//! Per-year batch scheduling and the ordered merge.
//!
//! Each year is an independent batch: its rows are loaded from the
//! [`RowSource`] and transformed on the blocking thread pool. At most
//! `workers` batches run at once. Finished batches are keyed by year and
//! concatenated in ascending year order, so completion order never affects
//! the output.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crime_table_crime_models::NormalizedRecord;
use crime_table_source::RowSource;
use crime_table_source::progress::{ProgressCallback, null_progress};
use futures::stream::{self, StreamExt as _};

use crate::PipelineError;
use crate::sink::RecordSink;
use crate::transform::transform;

/// Default cap on concurrently processed years.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Number of workers to use: `max_workers` capped by available
/// parallelism, and never below one.
#[must_use]
pub fn worker_count(max_workers: usize) -> usize {
    let available = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
    max_workers.min(available).max(1)
}

/// The transformed rows of one year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearBatch {
    /// Year this batch was loaded for.
    pub year: i32,
    /// Number of raw rows the source supplied.
    pub raw_rows: usize,
    /// Transformed rows, in source order.
    pub records: Vec<NormalizedRecord>,
    /// How many of `records` have no coordinates.
    pub missing_coordinates: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Number of years processed.
    pub years: usize,
    /// Rows handed to the sink.
    pub rows: u64,
    /// Rows whose coordinates were outside the reprojection window.
    pub missing_coordinates: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Loads and transforms one year's rows.
///
/// # Errors
///
/// * [`PipelineError::SourceUnavailable`] if the rows cannot be loaded
/// * [`PipelineError::Record`] for the first row that fails to transform
pub fn process_year(source: &dyn RowSource, year: i32) -> Result<YearBatch, PipelineError> {
    let start = Instant::now();
    log::debug!("Loading {year} from {}", source.location(year));

    let raw = source
        .load(year)
        .map_err(|source| PipelineError::SourceUnavailable { year, source })?;
    let raw_rows = raw.len();

    let records = raw
        .into_iter()
        .enumerate()
        .map(|(row, record)| {
            transform(record).map_err(|source| PipelineError::Record { year, row, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let missing_coordinates = records.iter().filter(|r| r.coordinates.is_none()).count();

    log::info!(
        "{year}: {} rows in {:.1}s",
        records.len(),
        start.elapsed().as_secs_f64()
    );
    if missing_coordinates > 0 {
        log::warn!("{year}: {missing_coordinates} rows have no usable coordinates");
    }

    Ok(YearBatch {
        year,
        raw_rows,
        records,
        missing_coordinates,
    })
}

/// Checks that every requested year completed with one output row per input
/// row, and returns the batches in ascending year order.
///
/// # Errors
///
/// Returns [`PipelineError::MergeInconsistency`] if a year is missing or a
/// batch's row counts disagree.
pub fn order_batches(
    years: &[i32],
    mut completed: BTreeMap<i32, YearBatch>,
) -> Result<Vec<YearBatch>, PipelineError> {
    let mut ordered = Vec::with_capacity(years.len());

    for &year in years {
        let batch = completed
            .remove(&year)
            .ok_or_else(|| PipelineError::MergeInconsistency {
                year,
                reason: "no batch completed for this year".to_string(),
            })?;

        if batch.records.len() != batch.raw_rows {
            return Err(PipelineError::MergeInconsistency {
                year,
                reason: format!(
                    "{} raw rows produced {} output rows",
                    batch.raw_rows,
                    batch.records.len()
                ),
            });
        }

        ordered.push(batch);
    }

    if let Some(&year) = completed.keys().next() {
        return Err(PipelineError::MergeInconsistency {
            year,
            reason: "batch completed for a year that was not requested".to_string(),
        });
    }

    Ok(ordered)
}

/// Concatenates ordered batches into one dataset.
#[must_use]
pub fn merge(batches: Vec<YearBatch>) -> Vec<NormalizedRecord> {
    let total = batches.iter().map(|b| b.records.len()).sum();
    let mut merged = Vec::with_capacity(total);
    for batch in batches {
        merged.extend(batch.records);
    }
    merged
}

/// Runs year batches in parallel and merges them in year order.
pub struct Orchestrator {
    source: Arc<dyn RowSource>,
    workers: usize,
    progress: Arc<dyn ProgressCallback>,
}

impl Orchestrator {
    /// Creates an orchestrator over `source` with the default worker cap and
    /// no progress reporting.
    #[must_use]
    pub fn new(source: Arc<dyn RowSource>) -> Self {
        Self {
            source,
            workers: worker_count(DEFAULT_MAX_WORKERS),
            progress: null_progress(),
        }
    }

    /// Sets the worker cap (further limited by available parallelism).
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.workers = worker_count(max_workers);
        self
    }

    /// Reports one unit of progress per completed year.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Effective number of concurrent batches.
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Processes every year in `years` and returns the validated batches in
    /// ascending year order.
    ///
    /// Stops at the first failing batch; no later results are collected.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidYearRange`] for an empty range,
    /// otherwise the first batch or merge error encountered.
    pub async fn run_batches(
        &self,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<YearBatch>, PipelineError> {
        if years.is_empty() {
            return Err(PipelineError::InvalidYearRange {
                start: *years.start(),
                end: *years.end(),
            });
        }

        let years: Vec<i32> = years.collect();
        log::info!(
            "Processing {} year(s) {}-{} with {} worker(s)",
            years.len(),
            years[0],
            years[years.len() - 1],
            self.workers
        );
        self.progress.set_total(years.len() as u64);

        let mut batches = stream::iter(years.iter().copied().map(|year| {
            let source = Arc::clone(&self.source);
            async move {
                match tokio::task::spawn_blocking(move || process_year(source.as_ref(), year)).await
                {
                    Ok(result) => result,
                    Err(source) => Err(PipelineError::Worker { year, source }),
                }
            }
        }))
        .buffer_unordered(self.workers);

        let mut completed = BTreeMap::new();
        while let Some(result) = batches.next().await {
            let batch = result?;
            self.progress.set_message(format!("finished {}", batch.year));
            self.progress.inc(1);
            completed.insert(batch.year, batch);
        }

        order_batches(&years, completed)
    }

    /// Processes every year in `years` and returns the merged dataset:
    /// years ascending, source row order within each year.
    ///
    /// # Errors
    ///
    /// See [`Self::run_batches`].
    pub async fn run(
        &self,
        years: RangeInclusive<i32>,
    ) -> Result<Vec<NormalizedRecord>, PipelineError> {
        Ok(merge(self.run_batches(years).await?))
    }

    /// Runs the whole pipeline and hands the merged dataset to `sink` in a
    /// single call. Nothing is written if any batch fails.
    ///
    /// # Errors
    ///
    /// Returns the first batch or merge error, or a sink error.
    pub async fn execute(
        &self,
        years: RangeInclusive<i32>,
        sink: Arc<dyn RecordSink>,
    ) -> Result<RunSummary, PipelineError> {
        let start = Instant::now();

        let batches = self.run_batches(years).await?;
        let year_count = batches.len();
        let missing_coordinates = batches.iter().map(|b| b.missing_coordinates).sum();
        let records = merge(batches);

        log::info!(
            "Writing {} rows to {}",
            records.len(),
            sink.location()
        );
        let rows = tokio::task::spawn_blocking(move || sink.write(&records))
            .await
            .map_err(PipelineError::SinkTask)??;

        let summary = RunSummary {
            years: year_count,
            rows,
            missing_coordinates,
            elapsed: start.elapsed(),
        };
        self.progress.finish(format!(
            "{} rows from {} year(s)",
            summary.rows, summary.years
        ));

        Ok(summary)
    }
}
