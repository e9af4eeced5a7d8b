//! Position fixes and the fix source seam.
//!
//! A [`PositionFix`] is one instantaneous reading from the positioning
//! service. The daemon only ever sees 3D-quality fixes with the speed
//! noise floor already applied; both guarantees are enforced at the source
//! boundary, not in the decision engine.
//!
//! The [`FixSource`] trait abstracts the positioning service so the daemon
//! loop and its tests can run against scripted fixes. The production
//! implementation is [`gpsd::GpsdSource`].

mod gpsd;

pub use gpsd::{GpsdConfig, GpsdSource};

use thiserror::Error;

/// Quality of a position fix as reported by the positioning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixQuality {
    /// No usable fix.
    NoFix,
    /// Two-dimensional fix (no altitude).
    TwoD,
    /// Full three-dimensional fix.
    ThreeD,
}

impl FixQuality {
    /// Maps the numeric mode field of the wire protocol (1/2/3).
    pub fn from_mode(mode: u8) -> Self {
        match mode {
            2 => FixQuality::TwoD,
            3 => FixQuality::ThreeD,
            _ => FixQuality::NoFix,
        }
    }
}

/// One instantaneous position reading.
///
/// Immutable once produced. Speed is in km/h and already clamped to exactly
/// zero below the configured noise floor; any fix handed to the decision
/// engine has 3D quality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// Latitude in degrees (WGS84).
    pub latitude: f64,
    /// Longitude in degrees (WGS84).
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
    /// Ground speed in km/h, zero below the noise floor.
    pub speed: f64,
    /// Ground track in degrees (0-360).
    pub track: f64,
    /// Longitude error estimate as reported by the source.
    pub epx: f64,
    /// Latitude error estimate as reported by the source.
    pub epy: f64,
    /// Vertical error estimate as reported by the source.
    pub epv: f64,
}

impl PositionFix {
    /// True when the fix's speed is exactly stationary.
    pub fn is_stationary(&self) -> bool {
        self.speed == 0.0
    }
}

/// Errors that can occur while acquiring fixes.
#[derive(Debug, Error)]
pub enum FixSourceError {
    /// Could not reach the positioning service.
    #[error("Failed to connect to positioning service at {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The connection dropped while waiting for a fix.
    #[error("Positioning service connection lost: {0}")]
    Disconnected(std::io::Error),

    /// The service sent a line we could not parse.
    #[error("Unparseable message from positioning service: {0}")]
    Protocol(String),
}

/// Source of position fixes.
///
/// `next_fix` blocks until a 3D-quality fix is available, silently
/// discarding lesser fixes. There is no modeled recovery: if the source
/// fails, the error propagates and the supervisor restarts the process.
pub trait FixSource {
    /// Blocks until the next 3D fix is available.
    fn next_fix(&mut self) -> Result<PositionFix, FixSourceError>;
}
