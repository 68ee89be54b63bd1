//! Per-row normalization.
//!
//! [`transform`] turns one [`RawRecord`] into one [`NormalizedRecord`]:
//! the date is composed from its parts, the hour is bucketed into a
//! [`TimeOfDay`] (a missing hour is `Night`), and the easting/northing is reprojected to latitude and
//! longitude when it falls inside the accepted window.

use chrono::NaiveDate;
use crime_table_crime_models::{Coordinates, NormalizedRecord, RawRecord, TimeOfDay};
use crime_table_projection::{Hemisphere, ProjectionError, to_lat_lng};

/// UTM zone the source coordinates are projected in.
pub const UTM_ZONE: u8 = 10;

/// Hemisphere the source northings are measured in.
pub const UTM_HEMISPHERE: Hemisphere = Hemisphere::Northern;

/// Exclusive easting bounds a coordinate must fall within to be reprojected.
pub const EASTING_BOUNDS: (f64, f64) = (100_000.0, 999_999.0);

/// Exclusive northing bounds a coordinate must fall within to be reprojected.
pub const NORTHING_BOUNDS: (f64, f64) = (0.0, 10_000_000.0);

/// Failure to normalize a single record.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Year, month, and day do not name a real calendar date.
    #[error("invalid date components: year={year} month={month} day={day}")]
    InvalidDateComponents {
        /// Raw year.
        year: i32,
        /// Raw month.
        month: u32,
        /// Raw day.
        day: u32,
    },

    /// The coordinate passed the window check but could not be reprojected.
    #[error("reprojection of ({x}, {y}) failed: {source}")]
    ReprojectionFailure {
        /// Raw easting.
        x: f64,
        /// Raw northing.
        y: f64,
        /// Underlying projection error.
        source: ProjectionError,
    },
}

/// Whether an easting/northing pair lies strictly inside the reprojection
/// window. `NaN` never does.
#[must_use]
pub fn is_projectable(x: f64, y: f64) -> bool {
    EASTING_BOUNDS.0 < x && x < EASTING_BOUNDS.1 && NORTHING_BOUNDS.0 < y && y < NORTHING_BOUNDS.1
}

/// Normalizes one raw record.
///
/// Coordinates outside the window become `None` without being reprojected.
///
/// # Errors
///
/// * [`TransformError::ReprojectionFailure`] if an in-window coordinate
///   cannot be reprojected
/// * [`TransformError::InvalidDateComponents`] if the year/month/day are not
///   a valid date
pub fn transform(record: RawRecord) -> Result<NormalizedRecord, TransformError> {
    let coordinates = reproject(record.x, record.y)?;

    let date = NaiveDate::from_ymd_opt(record.year, record.month, record.day).ok_or(
        TransformError::InvalidDateComponents {
            year: record.year,
            month: record.month,
            day: record.day,
        },
    )?;

    Ok(NormalizedRecord {
        crime_type: record.crime_type,
        year: record.year,
        date,
        time_of_day: record.hour.map_or(TimeOfDay::Night, TimeOfDay::from_hour),
        neighbourhood: record.neighbourhood,
        coordinates,
    })
}

fn reproject(x: f64, y: f64) -> Result<Option<Coordinates>, TransformError> {
    if !is_projectable(x, y) {
        return Ok(None);
    }

    let (latitude, longitude) = to_lat_lng(x, y, UTM_ZONE, UTM_HEMISPHERE)
        .map_err(|source| TransformError::ReprojectionFailure { x, y, source })?;

    Ok(Some(Coordinates {
        latitude,
        longitude,
    }))
}
