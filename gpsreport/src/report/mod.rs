//! Report formatting for the tracking server.
//!
//! Serializes a position fix (plus optional battery telemetry) into the
//! key=value parameter string the server expects, and assembles the final
//! report URL. All functions here are pure; wall-clock values are passed
//! in by the caller.
//!
//! The parameter order is fixed and part of the wire contract. Note that
//! `bearing` and `track` both carry the fix's track value - the server
//! consumes either depending on version, so we send both.

use crate::fix::PositionFix;
use crate::telemetry::{TelemetryError, TelemetrySample};

/// Formats the position parameters of a basic report.
pub fn basic_params(fix: &PositionFix) -> String {
    format!(
        "&lat={}&lon={}&altitude={}&speed={}&bearing={}&epx={}&epy={}&epv={}&track={}",
        fix.latitude,
        fix.longitude,
        fix.altitude,
        fix.speed,
        fix.track,
        fix.epx,
        fix.epy,
        fix.epv,
        fix.track,
    )
}

/// Formats a full report: position parameters plus battery telemetry.
///
/// A failed telemetry fetch degrades to a single error marker instead of
/// the battery fields; it never suppresses the report itself.
pub fn full_params(
    fix: &PositionFix,
    telemetry: &Result<TelemetrySample, TelemetryError>,
) -> String {
    let mut params = basic_params(fix);
    match telemetry {
        Ok(sample) => {
            params.push_str(&format!(
                "&batt={}&battery={}&current={}&batterystarter={}",
                sample.state_of_charge,
                sample.battery_voltage,
                sample.current,
                sample.starter_voltage,
            ));
        }
        Err(_) => params.push_str("&fhemerror=yes"),
    }
    params
}

/// Appends the `sendtime` diagnostic field.
///
/// `sendtime` carries the wall clock at format time with sub-second
/// resolution; the server side uses it to diagnose clock skew and fix-rate
/// mismatches.
pub fn with_sendtime(mut params: String, sendtime_secs: f64) -> String {
    params.push_str(&format!("&sendtime={:.6}", sendtime_secs));
    params
}

/// Assembles the final report URL.
///
/// Shape: `{base}/?id={device}&timestamp={unix_secs}{params}` where every
/// key in `params` is already `&`-prefixed.
pub fn report_url(base_url: &str, device_id: &str, timestamp_secs: i64, params: &str) -> String {
    format!(
        "{}/?id={}&timestamp={}{}",
        base_url, device_id, timestamp_secs, params
    )
}
