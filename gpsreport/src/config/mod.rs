//! Static daemon configuration.
//!
//! Configuration is read once at startup from an INI file; there is no
//! runtime reconfiguration. Invalid or missing required values are fatal -
//! the daemon fails fast and lets the supervisor restart it with a
//! corrected file.
//!
//! # File format
//!
//! ```ini
//! [server]
//! url = https://tracker.example:5055
//! device_id = van-1
//! send_timeout = 5
//!
//! [timing]
//! sleep = 1
//! int_always = 60
//! int_full = 0
//! int_move = 10
//! int_track = 2
//! use_wallclock = true
//!
//! [motion]
//! dist_move = 0.01
//! chg_speed = 10
//! chg_track = 5
//! min_speed = 2
//!
//! [gpsd]
//! addr = 127.0.0.1:2947
//!
//! [telemetry]
//! addr = 127.0.0.1:7072
//! device = bmv
//! timeout = 5
//! ```
//!
//! Only `[server] url` and `[server] device_id` are required; every other
//! key falls back to the defaults above. Interval values of `0` disable
//! the respective report rule.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::engine::TriggerConfig;
use crate::fix::GpsdConfig;
use crate::telemetry::FhemConfig;

/// Default sampling interval in seconds.
const DEFAULT_SLEEP_SECS: u64 = 1;

/// Default HTTP send timeout in seconds.
const DEFAULT_SEND_TIMEOUT_SECS: u64 = 5;

/// Errors that make the configuration unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or parsed as INI.
    #[error("Failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// A required key is absent.
    #[error("Missing required config key [{section}] {key}")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },

    /// A key is present but its value does not parse.
    #[error("Invalid value '{value}' for [{section}] {key}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },

    /// No config path given and no user config directory available.
    #[error("Could not determine default config path; pass one explicitly")]
    NoDefaultPath,
}

/// Tracking server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base URL of the tracking server (no trailing slash).
    pub url: String,
    /// Device identifier sent with every report.
    pub device_id: String,
    /// HTTP request timeout.
    pub send_timeout: Duration,
}

/// Complete daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tracking server settings.
    pub server: ServerConfig,
    /// Report trigger cadences and thresholds.
    pub triggers: TriggerConfig,
    /// Sampling interval of the daemon loop.
    pub sleep: Duration,
    /// Synchronize the tick counter to the wall clock.
    pub use_wallclock: bool,
    /// gpsd connection settings.
    pub gpsd: GpsdConfig,
    /// Battery telemetry connection settings.
    pub telemetry: FhemConfig,
}

/// Read helper over one INI section.
struct Section<'a> {
    ini: &'a Ini,
    name: &'static str,
}

impl<'a> Section<'a> {
    fn get(&self, key: &'static str) -> Option<&'a str> {
        self.ini.section(Some(self.name)).and_then(|s| s.get(key))
    }

    fn required(&self, key: &'static str) -> Result<&'a str, ConfigError> {
        self.get(key).ok_or(ConfigError::MissingKey {
            section: self.name,
            key,
        })
    }

    fn parse_or<T: std::str::FromStr>(
        &self,
        key: &'static str,
        default: T,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                section: self.name,
                key,
                value: raw.to_string(),
            }),
        }
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidValue {
                    section: self.name,
                    key,
                    value: raw.to_string(),
                }),
            },
        }
    }
}

impl Config {
    /// Loads and validates configuration from an INI file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Default config location under the user config directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("gpsreport").join("config.ini"))
            .ok_or(ConfigError::NoDefaultPath)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let server = Section { ini, name: "server" };
        let timing = Section { ini, name: "timing" };
        let motion = Section { ini, name: "motion" };
        let gpsd = Section { ini, name: "gpsd" };
        let telemetry = Section {
            ini,
            name: "telemetry",
        };

        let url = server.required("url")?.trim_end_matches('/').to_string();
        if url.is_empty() {
            return Err(ConfigError::InvalidValue {
                section: "server",
                key: "url",
                value: String::new(),
            });
        }
        let device_id = server.required("device_id")?.to_string();
        if device_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                section: "server",
                key: "device_id",
                value: String::new(),
            });
        }

        let defaults = TriggerConfig::default();
        let triggers = TriggerConfig {
            int_always: timing.parse_or("int_always", defaults.int_always)?,
            int_full: timing.parse_or("int_full", defaults.int_full)?,
            int_move: timing.parse_or("int_move", defaults.int_move)?,
            int_track: timing.parse_or("int_track", defaults.int_track)?,
            dist_move_km: motion.parse_or("dist_move", defaults.dist_move_km)?,
            chg_speed_kmh: motion.parse_or("chg_speed", defaults.chg_speed_kmh)?,
            chg_track_deg: motion.parse_or("chg_track", defaults.chg_track_deg)?,
        };

        let motion_values: [(&'static str, f64); 3] = [
            ("dist_move", triggers.dist_move_km),
            ("chg_speed", triggers.chg_speed_kmh),
            ("chg_track", triggers.chg_track_deg),
        ];
        for (key, value) in motion_values {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    section: "motion",
                    key,
                    value: value.to_string(),
                });
            }
        }

        let sleep_secs: u64 = timing.parse_or("sleep", DEFAULT_SLEEP_SECS)?;
        if sleep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                section: "timing",
                key: "sleep",
                value: "0".to_string(),
            });
        }

        let gpsd_defaults = GpsdConfig::default();
        let min_speed: f64 = motion.parse_or("min_speed", gpsd_defaults.min_speed_kmh)?;
        if !min_speed.is_finite() || min_speed < 0.0 {
            return Err(ConfigError::InvalidValue {
                section: "motion",
                key: "min_speed",
                value: min_speed.to_string(),
            });
        }

        let fhem_defaults = FhemConfig::default();
        let telemetry_timeout: u64 = telemetry.parse_or("timeout", 5)?;

        Ok(Self {
            server: ServerConfig {
                url,
                device_id,
                send_timeout: Duration::from_secs(
                    server.parse_or("send_timeout", DEFAULT_SEND_TIMEOUT_SECS)?,
                ),
            },
            triggers,
            sleep: Duration::from_secs(sleep_secs),
            use_wallclock: timing.bool_or("use_wallclock", true)?,
            gpsd: GpsdConfig {
                addr: gpsd
                    .get("addr")
                    .unwrap_or(&gpsd_defaults.addr)
                    .to_string(),
                connect_timeout: gpsd_defaults.connect_timeout,
                min_speed_kmh: min_speed,
            },
            telemetry: FhemConfig {
                addr: telemetry
                    .get("addr")
                    .unwrap_or(&fhem_defaults.addr)
                    .to_string(),
                device: telemetry
                    .get("device")
                    .unwrap_or(&fhem_defaults.device)
                    .to_string(),
                connect_timeout: Duration::from_secs(telemetry_timeout),
                read_timeout: Duration::from_secs(telemetry_timeout),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load_str(contents: &str) -> Result<Config, ConfigError> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        Config::load(file.path())
    }

    const MINIMAL: &str = "[server]\nurl = https://tracker.example:5055\ndevice_id = van-1\n";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load_str(MINIMAL).unwrap();
        assert_eq!(config.server.url, "https://tracker.example:5055");
        assert_eq!(config.server.device_id, "van-1");
        assert_eq!(config.triggers.int_always, 60);
        assert_eq!(config.triggers.int_full, 0);
        assert_eq!(config.triggers.int_move, 10);
        assert_eq!(config.triggers.int_track, 2);
        assert!((config.triggers.dist_move_km - 0.01).abs() < 1e-9);
        assert!((config.triggers.chg_speed_kmh - 10.0).abs() < 1e-9);
        assert!((config.triggers.chg_track_deg - 5.0).abs() < 1e-9);
        assert!((config.gpsd.min_speed_kmh - 2.0).abs() < 1e-9);
        assert_eq!(config.sleep, Duration::from_secs(1));
        assert!(config.use_wallclock);
        assert_eq!(config.gpsd.addr, "127.0.0.1:2947");
        assert_eq!(config.telemetry.addr, "127.0.0.1:7072");
        assert_eq!(config.telemetry.device, "bmv");
    }

    #[test]
    fn test_full_config_overrides() {
        let config = load_str(
            "[server]\n\
             url = http://localhost:5055/\n\
             device_id = bike\n\
             send_timeout = 2\n\
             [timing]\n\
             sleep = 2\n\
             int_always = 30\n\
             int_full = 120\n\
             int_move = 5\n\
             int_track = 1\n\
             use_wallclock = no\n\
             [motion]\n\
             dist_move = 0.05\n\
             chg_speed = 15\n\
             chg_track = 10\n\
             min_speed = 3.5\n\
             [gpsd]\n\
             addr = 127.0.0.1:12947\n\
             [telemetry]\n\
             addr = 127.0.0.1:17072\n\
             device = battmon\n\
             timeout = 3\n",
        )
        .unwrap();

        // Trailing slash on the base URL is stripped
        assert_eq!(config.server.url, "http://localhost:5055");
        assert_eq!(config.server.send_timeout, Duration::from_secs(2));
        assert_eq!(config.sleep, Duration::from_secs(2));
        assert_eq!(config.triggers.int_always, 30);
        assert_eq!(config.triggers.int_full, 120);
        assert!(!config.use_wallclock);
        assert!((config.triggers.dist_move_km - 0.05).abs() < 1e-9);
        assert!((config.gpsd.min_speed_kmh - 3.5).abs() < 1e-9);
        assert_eq!(config.gpsd.addr, "127.0.0.1:12947");
        assert_eq!(config.telemetry.device, "battmon");
        assert_eq!(config.telemetry.read_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_url_is_fatal() {
        let result = load_str("[server]\ndevice_id = van-1\n");
        assert!(matches!(
            result,
            Err(ConfigError::MissingKey {
                section: "server",
                key: "url"
            })
        ));
    }

    #[test]
    fn test_missing_device_id_is_fatal() {
        let result = load_str("[server]\nurl = http://localhost:5055\n");
        assert!(matches!(
            result,
            Err(ConfigError::MissingKey {
                section: "server",
                key: "device_id"
            })
        ));
    }

    #[test]
    fn test_invalid_interval_is_fatal() {
        let result = load_str(&format!("{}[timing]\nint_always = often\n", MINIMAL));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_negative_threshold_is_fatal() {
        let result = load_str(&format!("{}[motion]\nchg_speed = -5\n", MINIMAL));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_sleep_is_fatal() {
        let result = load_str(&format!("{}[timing]\nsleep = 0\n", MINIMAL));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_intervals_allowed_as_disabled() {
        let config = load_str(&format!(
            "{}[timing]\nint_always = 0\nint_move = 0\nint_track = 0\n",
            MINIMAL
        ))
        .unwrap();
        assert_eq!(config.triggers.int_always, 0);
        assert_eq!(config.triggers.int_move, 0);
        assert_eq!(config.triggers.int_track, 0);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = Config::load(Path::new("/nonexistent/gpsreport.ini"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
