//! gpsreportd - position-reporting daemon binary.
//!
//! Thin wrapper around the `gpsreport` library: parses arguments, loads
//! the configuration file, wires up the gpsd source, FHEM telemetry and
//! HTTP sink, and runs the daemon loop until a termination signal arrives.
//!
//! The process is designed to run under a supervisor (e.g. a systemd
//! simple service with `Restart=always`): configuration problems and a
//! lost gpsd connection are fatal and rely on the external restart.

mod error;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gpsreport::fix::{FixSource, GpsdSource};
use gpsreport::sink::{DebugSink, HttpSink, ReportSink};
use gpsreport::telemetry::FhemClient;
use gpsreport::{Config, Daemon};

use error::CliError;

/// Report vehicle positions from gpsd to a tracking server.
#[derive(Parser, Debug)]
#[command(name = "gpsreportd", version = gpsreport::VERSION)]
struct Cli {
    /// Path to the INI configuration file (default: user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log report URLs instead of transmitting them
    #[arg(long)]
    debug: bool,

    /// Increase log verbosity (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&config_path)?;
    info!(path = %config_path.display(), "Configuration loaded");

    let source = GpsdSource::connect(&config.gpsd)?;
    let telemetry = FhemClient::new(config.telemetry.clone());

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        shutdown_handler.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    if cli.debug {
        info!("Debug mode: reports are logged, not transmitted");
        run_daemon(&config, source, telemetry, DebugSink, &shutdown)
    } else {
        let sink = HttpSink::with_timeout(config.server.send_timeout)?;
        run_daemon(&config, source, telemetry, sink, &shutdown)
    }
}

fn run_daemon<K: ReportSink>(
    config: &Config,
    source: impl FixSource,
    telemetry: FhemClient,
    sink: K,
    shutdown: &AtomicBool,
) -> Result<(), CliError> {
    let mut daemon = Daemon::new(
        config.server.clone(),
        config.triggers.clone(),
        config.sleep,
        config.use_wallclock,
        source,
        telemetry,
        sink,
    );
    daemon.run(shutdown)?;
    Ok(())
}
