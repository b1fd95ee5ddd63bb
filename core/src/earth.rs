//! Earth-related constants and functions
//!
//! The smoother works directly in geodetic degrees, so every tuning parameter supplied in feet has
//! to be converted into degrees of latitude or longitude before it can become a variance. One
//! degree of latitude is roughly 69 statute miles everywhere, but one degree of longitude shrinks
//! with the cosine of the latitude. Two conversions are provided:
//!
//! - the empirical pair [LATITUDE_MILES_PER_DEGREE] / [LONGITUDE_MILES_PER_DEGREE] (69 and 53
//!   miles), valid near 40° N, and
//! - [degree_lengths_miles], which derives both lengths from the WGS84 ellipsoid at an arbitrary
//!   reference latitude using the principal radii of curvature.
//!
//! The unit helpers at the bottom cover the imperial units the activity data is reported in.

use std::f64::consts::PI;

// Earth constants (WGS84)
/// Earth's equitorial radius in meters
pub const EQUATORIAL_RADIUS: f64 = 6378137.0; // meters
/// Earth's mean radius in meters
pub const MEAN_RADIUS: f64 = 6371000.0; // meters
/// Earth's eccentricity ($e$)
pub const ECCENTRICITY: f64 = 0.0818191908425; // unit-less
/// Earth's eccentricity squared ($e^2$)
pub const ECCENTRICITY_SQUARED: f64 = ECCENTRICITY * ECCENTRICITY;

// Unit constants
/// Feet in one statute mile
pub const FEET_PER_MILE: f64 = 5280.0;
/// Meters in one international foot
pub const METERS_PER_FOOT: f64 = 0.3048;
/// Meters in one statute mile
pub const METERS_PER_MILE: f64 = FEET_PER_MILE * METERS_PER_FOOT;

/// Empirical length of one degree of latitude in statute miles
pub const LATITUDE_MILES_PER_DEGREE: f64 = 69.0;
/// Empirical length of one degree of longitude in statute miles (near 40° latitude)
pub const LONGITUDE_MILES_PER_DEGREE: f64 = 53.0;

/// Calculate principal radii of curvature
///
/// # Parameters
/// - `latitude` - The WGS84 latitude in degrees
/// - `altitude` - The WGS84 altitude in meters
///
/// # Returns
/// A tuple of the principal radii of curvature (r_n, r_e, r_p) in meters where r_n is the radius
/// of curvature in the meridian (alternatively _M_ or R_M), r_e is the radius of curvature
/// in the prime vertical (alternatively as _N_ or R_N), and r_p is the radius of the parallel
/// circle through the point.
///
/// # Example
/// ```rust
/// use tracksmooth::earth;
/// let latitude: f64 = 45.0;
/// let altitude: f64 = 1000.0;
/// let (r_n, r_e, r_p) = earth::principal_radii(&latitude, &altitude);
/// assert!(r_n < r_e);
/// assert!(r_p < r_e);
/// ```
pub fn principal_radii(latitude: &f64, altitude: &f64) -> (f64, f64, f64) {
    let latitude_rad: f64 = (latitude).to_radians();
    let sin_lat: f64 = latitude_rad.sin();
    let sin_lat_sq: f64 = sin_lat * sin_lat;
    let r_n: f64 = (EQUATORIAL_RADIUS * (1.0 - ECCENTRICITY_SQUARED))
        / (1.0 - ECCENTRICITY_SQUARED * sin_lat_sq).powf(3.0 / 2.0);
    let r_e: f64 = EQUATORIAL_RADIUS / (1.0 - ECCENTRICITY_SQUARED * sin_lat_sq).sqrt();
    let r_p: f64 = (r_e + altitude) * latitude_rad.cos();
    (r_n, r_e, r_p)
}

/// Length of one degree of latitude and one degree of longitude, in statute miles, on the WGS84
/// ellipsoid surface at the given latitude (degrees).
///
/// The longitude length goes to zero at the poles; callers must check it before dividing.
pub fn degree_lengths_miles(latitude: f64) -> (f64, f64) {
    let (r_n, _, r_p) = principal_radii(&latitude, &0.0);
    let to_miles = PI / 180.0 / METERS_PER_MILE;
    (r_n * to_miles, r_p * to_miles)
}

/// Convert a distance in feet to degrees along an axis whose degree spans `miles_per_degree`.
#[inline]
pub fn feet_to_degrees(feet: f64, miles_per_degree: f64) -> f64 {
    feet / FEET_PER_MILE / miles_per_degree
}

/// Great-circle distance in meters between two WGS84 positions given in degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * MEAN_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Total length in meters of a polyline of (latitude, longitude) degrees
pub fn path_length(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(w[0].0, w[0].1, w[1].0, w[1].1))
        .sum()
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / METERS_PER_FOOT
}

pub fn meters_to_miles(meters: f64) -> f64 {
    meters / METERS_PER_MILE
}

pub fn meters_per_second_to_mph(speed: f64) -> f64 {
    meters_to_miles(speed) * 3600.0
}

/// Format a duration in seconds as `HH:MM:SS`, rounding to whole seconds.
pub fn seconds_to_time(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}
