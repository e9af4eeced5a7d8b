//! Report transport.
//!
//! A [`ReportSink`] accepts a fully-assembled report URL and performs the
//! network call. Transport failures are returned as typed errors so the
//! daemon can make an explicit, auditable choice to log and carry on -
//! there are no retries and no fatal transport errors.
//!
//! [`DebugSink`] replaces transmission with logging for dry runs.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Default HTTP request timeout.
const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors that can occur while dispatching a report.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Building the HTTP client failed (TLS setup, invalid config).
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    /// The GET request failed (connect, DNS, timeout, ...).
    #[error("Report send failed: {0}")]
    Send(String),
}

/// Accepts a formatted report URL and performs the network call.
///
/// Implementations must not interpret the response beyond transport
/// success; the server's body and status carry no contract.
pub trait ReportSink {
    /// Dispatches one report.
    fn send(&self, url: &str) -> Result<(), SinkError>;
}

impl<S: ReportSink + ?Sized> ReportSink for &S {
    fn send(&self, url: &str) -> Result<(), SinkError> {
        (**self).send(url)
    }
}

/// Real sink performing an HTTP GET via reqwest.
pub struct HttpSink {
    client: reqwest::blocking::Client,
}

impl HttpSink {
    /// Creates a sink with the default request timeout.
    pub fn new() -> Result<Self, SinkError> {
        Self::with_timeout(DEFAULT_SEND_TIMEOUT)
    }

    /// Creates a sink with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

impl ReportSink for HttpSink {
    fn send(&self, url: &str) -> Result<(), SinkError> {
        // Response status and body are deliberately not interpreted; a
        // completed request is a delivered report.
        self.client
            .get(url)
            .send()
            .map_err(|e| SinkError::Send(e.to_string()))?;
        debug!("Report dispatched");
        Ok(())
    }
}

/// Sink that logs the URL instead of transmitting (debug mode).
#[derive(Debug, Default)]
pub struct DebugSink;

impl ReportSink for DebugSink {
    fn send(&self, url: &str) -> Result<(), SinkError> {
        info!(%url, "Debug mode: report not transmitted");
        Ok(())
    }
}
