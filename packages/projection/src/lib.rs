#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! UTM to WGS84 reprojection.
//!
//! Converts Universal Transverse Mercator eastings/northings back to
//! geographic latitude/longitude using the Krüger series for the inverse
//! transverse Mercator projection on the WGS84 ellipsoid. Accurate to well
//! under a millimetre anywhere inside the UTM domain.

use strum_macros::{AsRefStr, Display};

/// Smallest easting accepted, in metres.
pub const MIN_EASTING: f64 = 100_000.0;

/// Upper (exclusive) bound on eastings, in metres.
pub const MAX_EASTING: f64 = 1_000_000.0;

/// Upper (inclusive) bound on northings, in metres.
pub const MAX_NORTHING: f64 = 10_000_000.0;

const SCALE_FACTOR: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_223_563;
const ECCENTRICITY_SQ: f64 = FLATTENING * (2.0 - FLATTENING);

/// Third flattening.
const N: f64 = FLATTENING / (2.0 - FLATTENING);
const N2: f64 = N * N;
const N3: f64 = N2 * N;
const N4: f64 = N3 * N;
const N5: f64 = N4 * N;
const N6: f64 = N5 * N;

/// Radius of the rectifying sphere.
const RECTIFYING_RADIUS: f64 =
    SEMI_MAJOR_AXIS / (1.0 + N) * (1.0 + N2 / 4.0 + N4 / 64.0 + N6 / 256.0);

/// Krüger coefficients for the inverse series.
const BETA: [f64; 5] = [
    N / 2.0 - 2.0 * N2 / 3.0 + 37.0 * N3 / 96.0 - N4 / 360.0 - 81.0 * N5 / 512.0,
    N2 / 48.0 + N3 / 15.0 - 437.0 * N4 / 1440.0 + 46.0 * N5 / 105.0,
    17.0 * N3 / 480.0 - 37.0 * N4 / 840.0 - 209.0 * N5 / 4480.0,
    4397.0 * N4 / 161_280.0 - 11.0 * N5 / 504.0,
    4583.0 * N5 / 161_280.0,
];

const MAX_ITERATIONS: usize = 10;
const CONVERGENCE: f64 = 1e-14;

/// Which half of the globe a UTM northing is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Hemisphere {
    /// Northings measured from the equator.
    Northern,
    /// Northings measured from a false origin 10,000 km south of the equator.
    Southern,
}

/// Errors returned by [`to_lat_lng`].
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    /// UTM zones are numbered 1 through 60.
    #[error("invalid UTM zone {0}: expected 1-60")]
    InvalidZone(u8),

    /// Easting outside `[100000, 1000000)` (includes `NaN`).
    #[error("easting {0} out of range [100000, 1000000)")]
    EastingOutOfRange(f64),

    /// Northing outside `[0, 10000000]` (includes `NaN`).
    #[error("northing {0} out of range [0, 10000000]")]
    NorthingOutOfRange(f64),

    /// The series produced a non-finite or out-of-bounds result.
    #[error("reprojection of ({easting}, {northing}) did not converge to a valid position")]
    Degenerate {
        /// Input easting.
        easting: f64,
        /// Input northing.
        northing: f64,
    },
}

/// Longitude of the central meridian of a UTM zone, in degrees.
#[must_use]
pub fn central_meridian(zone: u8) -> f64 {
    f64::from(zone) * 6.0 - 183.0
}

/// Converts a UTM position into `(latitude, longitude)` in decimal degrees.
///
/// # Errors
///
/// * [`ProjectionError::InvalidZone`] if `zone` is not 1-60
/// * [`ProjectionError::EastingOutOfRange`] / [`ProjectionError::NorthingOutOfRange`]
///   if the position lies outside the UTM domain or is not a number
/// * [`ProjectionError::Degenerate`] if the result is not a valid position
pub fn to_lat_lng(
    easting: f64,
    northing: f64,
    zone: u8,
    hemisphere: Hemisphere,
) -> Result<(f64, f64), ProjectionError> {
    if !(1..=60).contains(&zone) {
        return Err(ProjectionError::InvalidZone(zone));
    }
    if !(MIN_EASTING..MAX_EASTING).contains(&easting) {
        return Err(ProjectionError::EastingOutOfRange(easting));
    }
    if !(0.0..=MAX_NORTHING).contains(&northing) {
        return Err(ProjectionError::NorthingOutOfRange(northing));
    }

    let x = easting - FALSE_EASTING;
    let y = match hemisphere {
        Hemisphere::Northern => northing,
        Hemisphere::Southern => northing - FALSE_NORTHING_SOUTH,
    };

    let xi = y / (SCALE_FACTOR * RECTIFYING_RADIUS);
    let eta = x / (SCALE_FACTOR * RECTIFYING_RADIUS);

    let mut xi_prime = xi;
    let mut eta_prime = eta;
    let mut k = 0.0;
    for beta in BETA {
        k += 2.0;
        xi_prime -= beta * (k * xi).sin() * (k * eta).cosh();
        eta_prime -= beta * (k * xi).cos() * (k * eta).sinh();
    }

    let chi = (xi_prime.sin() / eta_prime.cosh()).asin();
    let lambda = eta_prime.sinh().atan2(xi_prime.cos());

    let latitude = geodetic_tangent(chi.tan()).atan().to_degrees();
    let longitude = normalize_longitude(central_meridian(zone) + lambda.to_degrees());

    if !latitude.is_finite() || !longitude.is_finite() || latitude.abs() > 90.0 {
        return Err(ProjectionError::Degenerate { easting, northing });
    }

    Ok((latitude, longitude))
}

/// Newton iteration from the tangent of the conformal latitude to the
/// tangent of the geodetic latitude.
fn geodetic_tangent(tau_prime: f64) -> f64 {
    let e = ECCENTRICITY_SQ.sqrt();
    let one_minus_e2 = 1.0 - ECCENTRICITY_SQ;

    let mut tau = tau_prime;
    for _ in 0..MAX_ITERATIONS {
        let sigma = (e * (e * tau / tau.hypot(1.0)).atanh()).sinh();
        let tau_i = tau * sigma.hypot(1.0) - sigma * tau.hypot(1.0);
        let delta = (tau_prime - tau_i) / tau_i.hypot(1.0)
            * (one_minus_e2 * tau).mul_add(tau, 1.0)
            / (one_minus_e2 * tau.hypot(1.0));
        tau += delta;
        if delta.abs() <= CONVERGENCE * tau.abs().max(1.0) {
            break;
        }
    }
    tau
}

/// Wraps a longitude into `[-180, 180)`.
fn normalize_longitude(longitude: f64) -> f64 {
    (longitude + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: (f64, f64), expected: (f64, f64)) {
        assert!(
            (actual.0 - expected.0).abs() < 1e-6 && (actual.1 - expected.1).abs() < 1e-6,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn downtown_vancouver() {
        let pos = to_lat_lng(492_000.0, 5_459_000.0, 10, Hemisphere::Northern).unwrap();
        assert_close(pos, (49.283_700_328, -123.110_001_628));
    }

    #[test]
    fn central_meridian_has_no_longitude_offset() {
        let pos = to_lat_lng(500_000.0, 5_000_000.0, 10, Hemisphere::Northern).unwrap();
        assert_close(pos, (45.153_477_183, -123.0));
    }

    #[test]
    fn equator_origin() {
        let pos = to_lat_lng(500_000.0, 0.0, 31, Hemisphere::Northern).unwrap();
        assert_close(pos, (0.0, 3.0));
    }

    #[test]
    fn western_edge_near_equator() {
        let pos = to_lat_lng(100_001.0, 1.0, 10, Hemisphere::Northern).unwrap();
        assert_close(pos, (0.000_009_029_417, -126.592_318_234));
    }

    #[test]
    fn other_zone_northern() {
        let pos = to_lat_lng(334_786.0, 6_252_080.0, 32, Hemisphere::Northern).unwrap();
        assert_close(pos, (56.384_422_086, 6.323_977_374));
    }

    #[test]
    fn southern_hemisphere() {
        let pos = to_lat_lng(500_000.0, 4_000_000.0, 33, Hemisphere::Southern).unwrap();
        assert_close(pos, (-54.148_104_104, 15.0));
    }

    #[test]
    fn far_corner_stays_valid() {
        let pos = to_lat_lng(998_000.0, 9_999_999.0, 10, Hemisphere::Northern).unwrap();
        assert_close(pos, (85.543_975_500, -32.766_215_659));
    }

    #[test]
    fn rejects_bad_zone() {
        assert_eq!(
            to_lat_lng(500_000.0, 0.0, 0, Hemisphere::Northern),
            Err(ProjectionError::InvalidZone(0))
        );
        assert_eq!(
            to_lat_lng(500_000.0, 0.0, 61, Hemisphere::Northern),
            Err(ProjectionError::InvalidZone(61))
        );
    }

    #[test]
    fn rejects_out_of_domain() {
        assert!(matches!(
            to_lat_lng(99_999.0, 5_000_000.0, 10, Hemisphere::Northern),
            Err(ProjectionError::EastingOutOfRange(_))
        ));
        assert!(matches!(
            to_lat_lng(1_000_000.0, 5_000_000.0, 10, Hemisphere::Northern),
            Err(ProjectionError::EastingOutOfRange(_))
        ));
        assert!(matches!(
            to_lat_lng(500_000.0, -1.0, 10, Hemisphere::Northern),
            Err(ProjectionError::NorthingOutOfRange(_))
        ));
        assert!(matches!(
            to_lat_lng(500_000.0, 10_000_001.0, 10, Hemisphere::Northern),
            Err(ProjectionError::NorthingOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_nan() {
        assert!(matches!(
            to_lat_lng(f64::NAN, 5_000_000.0, 10, Hemisphere::Northern),
            Err(ProjectionError::EastingOutOfRange(_))
        ));
        assert!(matches!(
            to_lat_lng(500_000.0, f64::NAN, 10, Hemisphere::Northern),
            Err(ProjectionError::NorthingOutOfRange(_))
        ));
    }

    #[test]
    fn central_meridians() {
        assert!((central_meridian(1) - -177.0).abs() < f64::EPSILON);
        assert!((central_meridian(10) - -123.0).abs() < f64::EPSILON);
        assert!((central_meridian(60) - 177.0).abs() < f64::EPSILON);
    }

    #[test]
    fn longitude_wraps() {
        assert!((normalize_longitude(190.0) - -170.0).abs() < 1e-12);
        assert!((normalize_longitude(-181.0) - 179.0).abs() < 1e-12);
        assert!((normalize_longitude(-123.0) - -123.0).abs() < 1e-12);
    }

    #[test]
    fn hemisphere_display() {
        assert_eq!(Hemisphere::Northern.to_string(), "northern");
        assert_eq!(Hemisphere::Southern.as_ref(), "southern");
    }
}
