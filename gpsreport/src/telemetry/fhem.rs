//! FHEM telemetry client.
//!
//! Sends a fixed `list` command to a local FHEM instance and extracts the
//! battery monitor readings from the free-text device listing. The reply
//! looks roughly like:
//!
//! ```text
//!   Readings:
//!     ...
//!     SOC        87
//!     V          12.82
//!     VS         12.31
//!     I          -1.4
//! ```
//!
//! Both the connect and the read are bounded by timeouts so a hung FHEM
//! instance cannot stall the reporting cadence.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, trace};

use super::{TelemetryError, TelemetrySample, TelemetrySource};

/// Default FHEM telnet address.
const DEFAULT_FHEM_ADDR: &str = "127.0.0.1:7072";

/// Default device to list.
const DEFAULT_DEVICE: &str = "bmv";

/// Configuration for the FHEM connection.
#[derive(Debug, Clone)]
pub struct FhemConfig {
    /// Address of the FHEM telnet port.
    pub addr: String,
    /// Name of the battery monitor device.
    pub device: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Read timeout for the reply.
    pub read_timeout: Duration,
}

impl Default for FhemConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_FHEM_ADDR.to_string(),
            device: DEFAULT_DEVICE.to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

/// Telemetry source backed by a FHEM instance.
pub struct FhemClient {
    config: FhemConfig,
    soc_re: Regex,
    vs_re: Regex,
    v_re: Regex,
    i_re: Regex,
}

impl FhemClient {
    /// Creates a client for the given FHEM instance.
    pub fn new(config: FhemConfig) -> Self {
        // Readings appear one per line as "  NAME  VALUE". The required
        // whitespace after the name keeps the V pattern off the VS line.
        Self {
            config,
            soc_re: Regex::new(r"(?m) SOC +([0-9]{1,3})").expect("static regex"),
            vs_re: Regex::new(r"(?m) VS +([0-9.]{1,6})").expect("static regex"),
            v_re: Regex::new(r"(?m) V +([0-9.]{1,6})").expect("static regex"),
            i_re: Regex::new(r"(?m) I +([0-9.-]{1,6})").expect("static regex"),
        }
    }

    /// Performs the raw command exchange and returns the reply text.
    fn exchange(&self, command: &str) -> Result<String, TelemetryError> {
        let addrs: Vec<_> = std::net::ToSocketAddrs::to_socket_addrs(&self.config.addr)
            .map_err(|e| TelemetryError::Connect {
                addr: self.config.addr.clone(),
                source: e,
            })?
            .collect();

        let addr = addrs.first().ok_or_else(|| TelemetryError::Connect {
            addr: self.config.addr.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "no address resolved",
            ),
        })?;

        let mut stream =
            TcpStream::connect_timeout(addr, self.config.connect_timeout).map_err(|e| {
                TelemetryError::Connect {
                    addr: self.config.addr.clone(),
                    source: e,
                }
            })?;
        stream.set_read_timeout(Some(self.config.read_timeout))?;

        // The trailing "exit" makes FHEM close the connection after the
        // reply, so read_to_string terminates on EOF.
        stream.write_all(format!("{}; exit\n", command).as_bytes())?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply)?;
        trace!(bytes = reply.len(), "FHEM reply received");
        Ok(reply)
    }

    /// Extracts one numeric capture from the reply.
    fn extract<'a>(
        re: &Regex,
        reply: &'a str,
        field: &'static str,
    ) -> Result<&'a str, TelemetryError> {
        re.captures(reply)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
            .ok_or(TelemetryError::FieldMissing(field))
    }

    fn parse_f64(value: &str, field: &'static str) -> Result<f64, TelemetryError> {
        value
            .parse()
            .map_err(|_| TelemetryError::FieldUnparseable {
                field,
                value: value.to_string(),
            })
    }

    /// Parses the four battery readings out of a device listing.
    fn parse_reply(&self, reply: &str) -> Result<TelemetrySample, TelemetryError> {
        let soc = Self::extract(&self.soc_re, reply, "SOC")?;
        let vs = Self::extract(&self.vs_re, reply, "VS")?;
        let v = Self::extract(&self.v_re, reply, "V")?;
        let i = Self::extract(&self.i_re, reply, "I")?;

        Ok(TelemetrySample {
            state_of_charge: soc.parse().map_err(|_| TelemetryError::FieldUnparseable {
                field: "SOC",
                value: soc.to_string(),
            })?,
            battery_voltage: Self::parse_f64(v, "V")?,
            starter_voltage: Self::parse_f64(vs, "VS")?,
            current: Self::parse_f64(i, "I")?,
        })
    }
}

impl TelemetrySource for FhemClient {
    fn fetch(&self) -> Result<TelemetrySample, TelemetryError> {
        let reply = self.exchange(&format!("list {}", self.config.device))?;
        let sample = self.parse_reply(&reply)?;
        debug!(
            soc = sample.state_of_charge,
            v = sample.battery_voltage,
            i = sample.current,
            "Telemetry sample fetched"
        );
        Ok(sample)
    }
}
