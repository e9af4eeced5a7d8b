//! gpsd client - pulls position fixes from a local gpsd instance.
//!
//! Speaks the JSON watch protocol: on connect we send a `?WATCH` command
//! and gpsd streams newline-delimited JSON objects back. Only `TPV`
//! reports with a 3D fix are surfaced; everything else (SKY, PPS, 2D
//! fixes, ...) is discarded silently.
//!
//! Unit handling happens here so the rest of the daemon is uniform:
//! gpsd reports speed in meters/second, we convert to km/h and clamp
//! speeds below the configured noise floor to exactly zero to suppress
//! position jitter at standstill.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, trace};

use super::{FixQuality, FixSource, FixSourceError, PositionFix};

/// Default gpsd address.
const DEFAULT_GPSD_ADDR: &str = "127.0.0.1:2947";

/// Watch command enabling the JSON report stream.
const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true}\n";

/// Conversion factor from meters/second (gpsd) to km/h.
const MPS_TO_KMH: f64 = 3.6;

/// Configuration for the gpsd connection.
#[derive(Debug, Clone)]
pub struct GpsdConfig {
    /// Address of the gpsd instance.
    pub addr: String,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Speeds below this value (km/h) are clamped to exactly zero.
    pub min_speed_kmh: f64,
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_GPSD_ADDR.to_string(),
            connect_timeout: Duration::from_secs(5),
            min_speed_kmh: 2.0,
        }
    }
}

/// A TPV (time-position-velocity) report from gpsd.
///
/// Fields gpsd omits (common while the receiver is settling) default to
/// zero; the mode gate below ensures we only act on full 3D fixes.
#[derive(Debug, Deserialize)]
struct TpvReport {
    #[serde(default)]
    mode: u8,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    alt: f64,
    /// Ground speed in meters/second.
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    track: f64,
    #[serde(default)]
    epx: f64,
    #[serde(default)]
    epy: f64,
    #[serde(default)]
    epv: f64,
}

/// Minimal envelope to dispatch on the report class.
#[derive(Debug, Deserialize)]
struct Envelope {
    class: String,
}

/// Blocking gpsd client implementing [`FixSource`].
pub struct GpsdSource {
    reader: BufReader<TcpStream>,
    min_speed_kmh: f64,
}

impl GpsdSource {
    /// Connects to gpsd and enables the JSON watch stream.
    pub fn connect(config: &GpsdConfig) -> Result<Self, FixSourceError> {
        let addrs: Vec<_> = std::net::ToSocketAddrs::to_socket_addrs(&config.addr)
            .map_err(|e| FixSourceError::Connect {
                addr: config.addr.clone(),
                source: e,
            })?
            .collect();

        let addr = addrs.first().ok_or_else(|| FixSourceError::Connect {
            addr: config.addr.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "no address resolved",
            ),
        })?;

        let mut stream = TcpStream::connect_timeout(addr, config.connect_timeout).map_err(|e| {
            FixSourceError::Connect {
                addr: config.addr.clone(),
                source: e,
            }
        })?;

        stream
            .write_all(WATCH_COMMAND.as_bytes())
            .map_err(FixSourceError::Disconnected)?;

        debug!(addr = %config.addr, "Connected to gpsd, watch enabled");

        Ok(Self {
            reader: BufReader::new(stream),
            min_speed_kmh: config.min_speed_kmh,
        })
    }

    /// Converts a raw TPV report into a [`PositionFix`], applying unit
    /// conversion and the speed noise floor.
    fn fix_from_tpv(&self, tpv: &TpvReport) -> PositionFix {
        let mut speed_kmh = tpv.speed * MPS_TO_KMH;
        if speed_kmh < self.min_speed_kmh {
            speed_kmh = 0.0;
        }

        PositionFix {
            latitude: tpv.lat,
            longitude: tpv.lon,
            altitude: tpv.alt,
            speed: speed_kmh,
            track: tpv.track,
            epx: tpv.epx,
            epy: tpv.epy,
            epv: tpv.epv,
        }
    }
}

impl FixSource for GpsdSource {
    fn next_fix(&mut self) -> Result<PositionFix, FixSourceError> {
        let mut line = String::new();

        // Loop until a 3D TPV report arrives; gpsd interleaves SKY and
        // other report classes on the same stream.
        loop {
            line.clear();
            let n = self
                .reader
                .read_line(&mut line)
                .map_err(FixSourceError::Disconnected)?;
            if n == 0 {
                return Err(FixSourceError::Disconnected(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "gpsd closed the connection",
                )));
            }

            let envelope: Envelope = match serde_json::from_str(line.trim()) {
                Ok(e) => e,
                Err(e) => {
                    return Err(FixSourceError::Protocol(format!(
                        "{} in line: {}",
                        e,
                        line.trim()
                    )))
                }
            };

            if envelope.class != "TPV" {
                trace!(class = %envelope.class, "Ignoring non-TPV report");
                continue;
            }

            let tpv: TpvReport = serde_json::from_str(line.trim())
                .map_err(|e| FixSourceError::Protocol(format!("bad TPV report: {}", e)))?;

            if FixQuality::from_mode(tpv.mode) != FixQuality::ThreeD {
                trace!(mode = tpv.mode, "Discarding fix without 3D quality");
                continue;
            }

            return Ok(self.fix_from_tpv(&tpv));
        }
    }
}
