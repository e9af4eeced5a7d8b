//! CLI error type.

use std::fmt;

use gpsreport::fix::FixSourceError;
use gpsreport::sink::SinkError;
use gpsreport::ConfigError;

/// Errors that terminate the daemon process.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded or validated.
    Config(ConfigError),

    /// The fix source failed (connect or mid-run).
    FixSource(FixSourceError),

    /// The HTTP sink could not be constructed.
    Sink(SinkError),

    /// Installing the signal handler failed.
    Signal(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::FixSource(e) => write!(f, "Fix source error: {}", e),
            CliError::Sink(e) => write!(f, "Report sink error: {}", e),
            CliError::Signal(msg) => write!(f, "Failed to set signal handler: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::FixSource(e) => Some(e),
            CliError::Sink(e) => Some(e),
            CliError::Signal(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<FixSourceError> for CliError {
    fn from(e: FixSourceError) -> Self {
        CliError::FixSource(e)
    }
}

impl From<SinkError> for CliError {
    fn from(e: SinkError) -> Self {
        CliError::Sink(e)
    }
}
