#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Crime record types shared by the row source, transformer, and sink.
//!
//! Every yearly source file is decoded into [`RawRecord`]s and every output
//! row is a [`NormalizedRecord`]. The column schemas for both shapes are
//! defined once here as [`RAW_COLUMNS`] and [`OUTPUT_COLUMNS`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Columns every yearly source file must provide. Any other columns are
/// projected out before transformation.
pub const RAW_COLUMNS: [&str; 8] = [
    "TYPE",
    "YEAR",
    "MONTH",
    "DAY",
    "HOUR",
    "NEIGHBOURHOOD",
    "X",
    "Y",
];

/// Columns of the unified output dataset, in output order.
pub const OUTPUT_COLUMNS: [&str; 7] = [
    "TYPE",
    "YEAR",
    "DATE",
    "TIMEOFDAY",
    "NEIGHBOURHOOD",
    "LATITUDE",
    "LONGITUDE",
];

/// Coarse part of the day an incident occurred in, derived from its hour.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum TimeOfDay {
    /// 06:00 through the 12 o'clock hour.
    Morning,
    /// 13:00 through the 17 o'clock hour.
    Afternoon,
    /// 18:00 through the 22 o'clock hour.
    Evening,
    /// Everything else (midnight to 05:59, and 23:00 onward).
    Night,
}

impl TimeOfDay {
    /// Buckets an hour of the day.
    ///
    /// Bounds are evaluated in order, so hour 12 is `Morning`. Hours outside
    /// `0..=23` fall through to `Night`.
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        if 6 <= hour && hour <= 12 {
            Self::Morning
        } else if 12 < hour && hour <= 17 {
            Self::Afternoon
        } else if 17 < hour && hour <= 22 {
            Self::Evening
        } else {
            Self::Night
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Morning, Self::Afternoon, Self::Evening, Self::Night]
    }
}

/// One incident as it appears in a yearly source file, restricted to
/// [`RAW_COLUMNS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct RawRecord {
    /// Offence category label (e.g. "Theft from Vehicle").
    #[serde(rename = "TYPE")]
    pub crime_type: String,
    /// Year the incident occurred.
    pub year: i32,
    /// Month, expected 1-12.
    pub month: u32,
    /// Day of month, expected 1-31.
    pub day: u32,
    /// Hour of day, expected 0-23. `None` when the source cell was blank.
    pub hour: Option<u32>,
    /// Neighbourhood name as reported by the source.
    pub neighbourhood: String,
    /// Projected easting in metres. `NaN` when the source cell was blank.
    pub x: f64,
    /// Projected northing in metres. `NaN` when the source cell was blank.
    pub y: f64,
}

/// A WGS84 latitude/longitude pair.
///
/// Output records hold an `Option<Coordinates>` so that latitude and
/// longitude are always present or absent together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

/// One incident in the unified output dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Offence category label, copied from the raw record.
    pub crime_type: String,
    /// Year, copied from the raw record.
    pub year: i32,
    /// Calendar date composed from year, month, and day.
    pub date: NaiveDate,
    /// Bucketed hour of the incident.
    pub time_of_day: TimeOfDay,
    /// Neighbourhood name, copied from the raw record.
    pub neighbourhood: String,
    /// Reprojected location, `None` when the raw easting/northing fell
    /// outside the accepted range.
    pub coordinates: Option<Coordinates>,
}

impl NormalizedRecord {
    /// Latitude, if the record has coordinates.
    #[must_use]
    pub fn latitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.latitude)
    }

    /// Longitude, if the record has coordinates.
    #[must_use]
    pub fn longitude(&self) -> Option<f64> {
        self.coordinates.map(|c| c.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hour_boundaries() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(13), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(22), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
    }

    #[test]
    fn every_hour_lands_in_exactly_one_bucket() {
        let mut counts = [0usize; 4];
        for hour in 0..24 {
            let bucket = TimeOfDay::from_hour(hour);
            let idx = TimeOfDay::all()
                .iter()
                .position(|b| *b == bucket)
                .unwrap();
            counts[idx] += 1;
        }
        assert_eq!(counts, [7, 5, 5, 7]);
        assert_eq!(counts.iter().sum::<usize>(), 24);
    }

    #[test]
    fn out_of_range_hour_is_night() {
        assert_eq!(TimeOfDay::from_hour(24), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(99), TimeOfDay::Night);
    }

    #[test]
    fn time_of_day_string_forms() {
        assert_eq!(TimeOfDay::Afternoon.to_string(), "Afternoon");
        assert_eq!(TimeOfDay::Night.as_ref(), "Night");
        assert_eq!("Evening".parse::<TimeOfDay>().unwrap(), TimeOfDay::Evening);
        assert!("evening".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn coordinates_present_or_absent_together() {
        let mut record = NormalizedRecord {
            crime_type: "Mischief".to_string(),
            year: 2019,
            date: NaiveDate::from_ymd_opt(2019, 3, 4).unwrap(),
            time_of_day: TimeOfDay::Night,
            neighbourhood: "Kitsilano".to_string(),
            coordinates: None,
        };
        assert!(record.latitude().is_none() && record.longitude().is_none());

        record.coordinates = Some(Coordinates {
            latitude: 49.26,
            longitude: -123.16,
        });
        assert_eq!(record.latitude(), Some(49.26));
        assert_eq!(record.longitude(), Some(-123.16));
    }

    #[test]
    fn output_schema_leads_with_passthrough_columns() {
        assert!(RAW_COLUMNS.contains(&"NEIGHBOURHOOD"));
        assert_eq!(OUTPUT_COLUMNS[0], RAW_COLUMNS[0]);
        assert_eq!(OUTPUT_COLUMNS[1], RAW_COLUMNS[1]);
        assert!(!OUTPUT_COLUMNS.contains(&"HOUR"));
    }
}
