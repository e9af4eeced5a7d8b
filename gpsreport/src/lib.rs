//! GpsReport - position-reporting daemon library.
//!
//! Continuously reads vehicle position fixes from a local gpsd instance,
//! decides via a small set of motion heuristics whether the current moment
//! is worth reporting, and if so formats and transmits a status update to
//! a remote tracking server over HTTP - optionally enriched with battery
//! telemetry from a local FHEM instance.
//!
//! # Architecture
//!
//! ```text
//! FixSource ──► ReportState::evaluate ──► report::*_params ──► ReportSink
//! (gpsd)        (decision engine)         (+ TelemetrySource       (HTTP GET)
//!                                            for full reports)
//! ```
//!
//! The decision engine ([`engine`]) is the core; everything around it is
//! thin I/O glue behind trait seams ([`fix::FixSource`],
//! [`telemetry::TelemetrySource`], [`sink::ReportSink`]) so the daemon
//! loop can be driven by scripted fixtures in tests.

pub mod config;
pub mod daemon;
pub mod engine;
pub mod fix;
pub mod geo;
pub mod report;
pub mod sink;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use daemon::{Daemon, ReportCounters};
pub use engine::{ReportDecision, ReportState, ReportTrigger, TriggerConfig};
pub use fix::{FixSource, FixSourceError, PositionFix};
pub use sink::{DebugSink, HttpSink, ReportSink};
pub use telemetry::{FhemClient, TelemetrySample, TelemetrySource};

/// Library version, from Cargo metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
