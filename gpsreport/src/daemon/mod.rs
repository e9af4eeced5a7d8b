//! The daemon loop.
//!
//! Drives one strictly sequential cycle per sampling tick: advance the
//! clock, pull the next 3D fix, evaluate the decision engine, and - when a
//! report is due - format, optionally fetch telemetry, and dispatch it.
//! Then sleep for the remainder of the current sample window.
//!
//! Transport and telemetry failures are absorbed here with a logged, typed
//! value: the report state still advances (the decision to report, not the
//! transport outcome, updates state) and the next opportunity is the next
//! natural trigger. A fix-source failure is fatal; the supervisor owns the
//! restart.
//!
//! The loop takes a cooperative shutdown flag so the binary can stop it
//! from a signal handler and tests can run a bounded number of ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::engine::{ReportDecision, ReportState, ReportTrigger, TriggerConfig};
use crate::fix::{FixSource, FixSourceError, PositionFix};
use crate::report;
use crate::sink::ReportSink;
use crate::telemetry::TelemetrySource;

/// The daemon's notion of the current second.
///
/// Either synchronized to the wall clock (so report cadences align across
/// restarts and devices) or a free-running counter advanced by the sample
/// interval. Only used for modulo-based cadence checks; never persisted.
#[derive(Debug)]
pub struct Clock {
    use_wallclock: bool,
    interval_secs: i64,
    second: i64,
}

impl Clock {
    /// Creates a clock; `interval` is the sampling interval.
    pub fn new(use_wallclock: bool, interval: Duration) -> Self {
        let interval_secs = interval.as_secs() as i64;
        Self {
            use_wallclock,
            interval_secs,
            // First tick of the free-running counter lands on zero so the
            // unconditional cadence fires a report right at startup.
            second: -interval_secs,
        }
    }

    /// Advances to the next tick and returns the current second.
    pub fn tick(&mut self) -> i64 {
        if self.use_wallclock {
            self.second = Utc::now().timestamp();
        } else {
            self.second += self.interval_secs;
        }
        self.second
    }
}

/// Counters for end-of-run summary logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportCounters {
    /// Ticks processed.
    pub ticks: u64,
    /// Reports handed to the sink successfully.
    pub sent: u64,
    /// Reports the sink failed to deliver.
    pub failed: u64,
}

/// The position-reporting daemon.
///
/// Owns the decision engine state and the three collaborators behind their
/// trait seams. Single-threaded by design: no locking is needed because
/// decision and state update happen on one thread, once per tick.
pub struct Daemon<S, T, K>
where
    S: FixSource,
    T: TelemetrySource,
    K: ReportSink,
{
    server: ServerConfig,
    triggers: TriggerConfig,
    clock: Clock,
    state: ReportState,
    source: S,
    telemetry: T,
    sink: K,
    sleep: Duration,
    counters: ReportCounters,
}

impl<S, T, K> Daemon<S, T, K>
where
    S: FixSource,
    T: TelemetrySource,
    K: ReportSink,
{
    /// Assembles a daemon from its configuration and collaborators.
    pub fn new(
        server: ServerConfig,
        triggers: TriggerConfig,
        sleep: Duration,
        use_wallclock: bool,
        source: S,
        telemetry: T,
        sink: K,
    ) -> Self {
        Self {
            server,
            triggers,
            clock: Clock::new(use_wallclock, sleep),
            state: ReportState::new(),
            source,
            telemetry,
            sink,
            sleep,
            counters: ReportCounters::default(),
        }
    }

    /// Current counter values.
    pub fn counters(&self) -> ReportCounters {
        self.counters
    }

    /// Runs one sampling tick: acquire, decide, dispatch, commit.
    ///
    /// Does not sleep; [`run`](Self::run) owns the pacing.
    pub fn tick(&mut self) -> Result<(), FixSourceError> {
        let second = self.clock.tick();
        let fix = self.source.next_fix()?;
        self.counters.ticks += 1;

        match self.state.evaluate(&self.triggers, &fix, second) {
            ReportDecision::NoReport => {}
            ReportDecision::Basic(trigger) => {
                let params = report::basic_params(&fix);
                self.dispatch(&fix, trigger, params);
            }
            ReportDecision::Full(trigger) => {
                // Telemetry failure degrades the report, never blocks it
                let telemetry = self.telemetry.fetch();
                if let Err(ref e) = telemetry {
                    warn!(error = %e, "Telemetry unavailable, sending error marker");
                }
                let params = report::full_params(&fix, &telemetry);
                self.dispatch(&fix, trigger, params);
            }
        }

        Ok(())
    }

    /// Formats the final URL, sends it, and commits the report state.
    ///
    /// State is committed unconditionally: a transport failure must not
    /// cause the same event to re-trigger on every following tick.
    fn dispatch(&mut self, fix: &PositionFix, trigger: ReportTrigger, params: String) {
        let now = Utc::now();
        let sendtime = now.timestamp_micros() as f64 / 1_000_000.0;
        let params = report::with_sendtime(params, sendtime);
        let url = report::report_url(
            &self.server.url,
            &self.server.device_id,
            now.timestamp(),
            &params,
        );

        match self.sink.send(&url) {
            Ok(()) => {
                self.counters.sent += 1;
                info!(
                    trigger = %trigger,
                    lat = fix.latitude,
                    lon = fix.longitude,
                    speed_kmh = fix.speed,
                    "Report sent"
                );
            }
            Err(e) => {
                // Best effort: log, count, wait for the next trigger
                self.counters.failed += 1;
                warn!(trigger = %trigger, error = %e, "Report send failed");
            }
        }

        self.state.commit(fix);
    }

    /// Runs ticks until the shutdown flag is set.
    ///
    /// Sleeps for the remainder of the current sample window after every
    /// tick, tolerating iterations whose blocking calls ate into the
    /// budget (the sleep clamps at zero, it never goes negative).
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), FixSourceError> {
        info!(
            server = %self.server.url,
            device = %self.server.device_id,
            "Position reporting daemon started"
        );

        while !shutdown.load(Ordering::SeqCst) {
            self.tick()?;
            std::thread::sleep(remaining_in_window(self.sleep));
        }

        let counters = self.counters;
        info!(
            ticks = counters.ticks,
            sent = counters.sent,
            failed = counters.failed,
            "Daemon stopped"
        );
        Ok(())
    }
}

/// Time left in the current sample window, clamped at zero.
///
/// Aligns ticks to wall-clock second boundaries: with a one second
/// interval, an iteration that took 200 ms sleeps 800 ms.
fn remaining_in_window(interval: Duration) -> Duration {
    let now = Utc::now();
    let into_second = f64::from(now.timestamp_subsec_micros()) / 1_000_000.0;
    let remaining = interval.as_secs_f64() - into_second;
    if remaining > 0.0 {
        Duration::from_secs_f64(remaining)
    } else {
        Duration::ZERO
    }
}
