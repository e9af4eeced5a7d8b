//! Battery telemetry for full reports.
//!
//! Full reports enrich the position data with battery state fetched from a
//! local home-automation instance (a FHEM server fronting a battery
//! monitor). The exchange is a single line-oriented request/response over
//! TCP; four numeric fields are extracted from the free-text reply.
//!
//! Telemetry is strictly best-effort: unreachable service or unparseable
//! reply degrades the report to an error marker, it never blocks or aborts
//! report transmission.

mod fhem;

pub use fhem::{FhemClient, FhemConfig};

use thiserror::Error;

/// One battery telemetry reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// State of charge in percent.
    pub state_of_charge: u32,
    /// Main battery voltage in volts.
    pub battery_voltage: f64,
    /// Starter battery voltage in volts.
    pub starter_voltage: f64,
    /// Battery current in amperes (negative while discharging).
    pub current: f64,
}

/// Errors that can occur while fetching telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Could not reach the telemetry service.
    #[error("Failed to connect to telemetry service at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The exchange failed mid-flight (includes read timeouts).
    #[error("Telemetry exchange failed: {0}")]
    Io(#[from] std::io::Error),

    /// A required field was missing from the reply.
    #[error("Telemetry field '{0}' not found in response")]
    FieldMissing(&'static str),

    /// A field was present but not a number we could parse.
    #[error("Telemetry field '{field}' has unparseable value '{value}'")]
    FieldUnparseable { field: &'static str, value: String },
}

/// Source of battery telemetry.
///
/// Implementations must bound their I/O with timeouts; the daemon calls
/// this synchronously from the report path.
pub trait TelemetrySource {
    /// Fetches a fresh telemetry sample.
    fn fetch(&self) -> Result<TelemetrySample, TelemetryError>;
}
