//! Geographic math for the report decision engine.
//!
//! Provides great-circle distance between two latitude/longitude pairs
//! (Haversine formula, spherical Earth) and minimal angular difference on
//! the circular bearing domain. Both are pure functions with no side
//! effects.

use std::f64::consts::PI;

/// Mean Earth radius in kilometers (spherical approximation).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Computes the great-circle distance between two points in kilometers.
///
/// Uses the Haversine formula on a spherical Earth. Accurate to ~0.5% which
/// is far below the movement thresholds this daemon works with.
///
/// # Arguments
///
/// * `lat1`, `lon1` - First point in degrees (WGS84)
/// * `lat2`, `lon2` - Second point in degrees (WGS84)
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.0;
    let lat2_rad = lat2 * PI / 180.0;
    let dlat = (lat2 - lat1) * PI / 180.0;
    let dlon = (lon2 - lon1) * PI / 180.0;

    let a = (dlat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Computes the minimal angular difference between two bearings.
///
/// Handles wraparound across north (e.g. 350° to 10° is 20°, not 340°).
/// Symmetric in its arguments; result is always in `[0, 180]`.
pub fn bearing_change(b1: f64, b2: f64) -> f64 {
    let mut delta = (b2 - b1).rem_euclid(360.0);
    if delta >= 180.0 {
        delta -= 360.0;
    }
    delta.abs()
}

/// Normalizes a bearing to the 0-360 range.
pub fn normalize_track(track: f64) -> f64 {
    track.rem_euclid(360.0)
}
