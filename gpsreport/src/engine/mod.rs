//! Report decision engine.
//!
//! Converts the continuous 1 Hz stream of position fixes into a sparse
//! stream of report decisions, balancing freshness (never miss a start,
//! stop, hard accel or turn) against volume (don't flood the server while
//! cruising at constant speed).
//!
//! # Rule priority
//!
//! Rules are evaluated in a fixed order, first match wins. The ordering
//! deliberately puts event rules (speed change, motion start/stop) ahead
//! of the periodic in-motion rules so a start/stop is never delayed to the
//! next cadence boundary:
//!
//! 1. unconditional interval (`int_always`)
//! 2. speed changed by more than `chg_speed`
//! 3. motion start (stationary → moving)
//! 4. motion stop (moving → stationary)
//! 5. while displaced more than `dist_move` since the last report:
//!    a. in-motion interval (`int_move`)
//!    b. track interval (`int_track`) + track changed more than `chg_track`
//!
//! A zero interval or threshold of the respective rule disables it.
//!
//! # Variant selection
//!
//! Whether a triggered report is basic or full (with battery telemetry) is
//! decided independently by the `int_full` cadence. `int_full` never fires
//! a report on its own; it only upgrades one that another rule triggered
//! on the same tick.

use std::fmt;

use tracing::debug;

use crate::fix::PositionFix;
use crate::geo::{bearing_change, haversine_km};

/// Default unconditional report interval in seconds.
pub const DEFAULT_INT_ALWAYS: u64 = 60;
/// Default full-report interval in seconds (0 = never send full reports).
pub const DEFAULT_INT_FULL: u64 = 0;
/// Default in-motion report interval in seconds.
pub const DEFAULT_INT_MOVE: u64 = 10;
/// Default track-check interval in seconds.
pub const DEFAULT_INT_TRACK: u64 = 2;
/// Default displacement defining "in motion" since the last report, in km.
pub const DEFAULT_DIST_MOVE_KM: f64 = 0.01;
/// Default track change forcing a report while turning, in degrees.
pub const DEFAULT_CHG_TRACK_DEG: f64 = 5.0;
/// Default speed change forcing an immediate report, in km/h.
pub const DEFAULT_CHG_SPEED_KMH: f64 = 10.0;

/// Why a report was triggered. Carried through to logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTrigger {
    /// The unconditional cadence boundary was hit.
    Interval,
    /// Speed changed by more than the configured delta.
    SpeedChange,
    /// Transition from stationary to moving.
    MotionStart,
    /// Transition from moving to stationary.
    MotionStop,
    /// Periodic report while in motion.
    MoveInterval,
    /// Track changed by more than the configured delta while in motion.
    TrackChange,
}

impl ReportTrigger {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportTrigger::Interval => "interval",
            ReportTrigger::SpeedChange => "speed-change",
            ReportTrigger::MotionStart => "motion-start",
            ReportTrigger::MotionStop => "motion-stop",
            ReportTrigger::MoveInterval => "move-interval",
            ReportTrigger::TrackChange => "track-change",
        }
    }
}

impl fmt::Display for ReportTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of evaluating one fix against the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportDecision {
    /// Nothing to report this tick.
    NoReport,
    /// Send a basic position report.
    Basic(ReportTrigger),
    /// Send a full report including battery telemetry.
    Full(ReportTrigger),
}

impl ReportDecision {
    /// True when a report (of either variant) should be sent.
    pub fn is_report(&self) -> bool {
        !matches!(self, ReportDecision::NoReport)
    }

    /// The trigger that fired, if any.
    pub fn trigger(&self) -> Option<ReportTrigger> {
        match self {
            ReportDecision::NoReport => None,
            ReportDecision::Basic(t) | ReportDecision::Full(t) => Some(*t),
        }
    }
}

/// Thresholds and cadences driving the decision rules.
///
/// Interval values are in seconds; zero disables the respective rule.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Unconditional report period.
    pub int_always: u64,
    /// Full-report period; upgrades the variant, never triggers by itself.
    pub int_full: u64,
    /// Report period while in motion.
    pub int_move: u64,
    /// Track-check period while in motion.
    pub int_track: u64,
    /// Displacement threshold defining "in motion" (km).
    pub dist_move_km: f64,
    /// Speed delta forcing an immediate report (km/h).
    pub chg_speed_kmh: f64,
    /// Track delta forcing a report while turning (degrees).
    pub chg_track_deg: f64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            int_always: DEFAULT_INT_ALWAYS,
            int_full: DEFAULT_INT_FULL,
            int_move: DEFAULT_INT_MOVE,
            int_track: DEFAULT_INT_TRACK,
            dist_move_km: DEFAULT_DIST_MOVE_KM,
            chg_speed_kmh: DEFAULT_CHG_SPEED_KMH,
            chg_track_deg: DEFAULT_CHG_TRACK_DEG,
        }
    }
}

impl TriggerConfig {
    /// True when `second` sits on a cadence boundary of `interval`.
    /// A zero interval means the cadence is disabled.
    fn on_boundary(interval: u64, second: i64) -> bool {
        interval != 0 && second.rem_euclid(interval as i64) == 0
    }
}

/// The engine's persistent memory of the last reported fix.
///
/// Initialized to zeros at daemon start and overwritten as a unit by
/// [`ReportState::commit`] after every decision to report - regardless of
/// whether the transport succeeded. Owned and mutated by a single thread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReportState {
    /// Latitude of the last reported fix.
    pub last_lat: f64,
    /// Longitude of the last reported fix.
    pub last_lon: f64,
    /// Track of the last reported fix.
    pub last_track: f64,
    /// Speed of the last reported fix.
    pub last_speed: f64,
}

impl ReportState {
    /// Creates the zero-initialized startup state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluates the current fix against this state and the clock second.
    ///
    /// Pure with respect to the state; call [`commit`](Self::commit)
    /// afterwards if the decision was to report.
    pub fn evaluate(
        &self,
        config: &TriggerConfig,
        fix: &PositionFix,
        second: i64,
    ) -> ReportDecision {
        match self.trigger(config, fix, second) {
            Some(trigger) => {
                // Variant choice is independent of the trigger: int_full
                // upgrades an already-triggered report, nothing more.
                if TriggerConfig::on_boundary(config.int_full, second) {
                    ReportDecision::Full(trigger)
                } else {
                    ReportDecision::Basic(trigger)
                }
            }
            None => ReportDecision::NoReport,
        }
    }

    /// Runs the priority-ordered rule chain; first match wins.
    fn trigger(
        &self,
        config: &TriggerConfig,
        fix: &PositionFix,
        second: i64,
    ) -> Option<ReportTrigger> {
        if TriggerConfig::on_boundary(config.int_always, second) {
            return Some(ReportTrigger::Interval);
        }

        if (self.last_speed - fix.speed).abs() > config.chg_speed_kmh {
            return Some(ReportTrigger::SpeedChange);
        }

        if self.last_speed == 0.0 && fix.speed > 0.0 {
            return Some(ReportTrigger::MotionStart);
        }

        if self.last_speed > 0.0 && fix.speed == 0.0 {
            return Some(ReportTrigger::MotionStop);
        }

        let dist_moved = haversine_km(self.last_lat, self.last_lon, fix.latitude, fix.longitude);
        if dist_moved > config.dist_move_km {
            if TriggerConfig::on_boundary(config.int_move, second) {
                return Some(ReportTrigger::MoveInterval);
            }

            if TriggerConfig::on_boundary(config.int_track, second)
                && bearing_change(self.last_track, fix.track) > config.chg_track_deg
            {
                return Some(ReportTrigger::TrackChange);
            }
        }

        debug!(
            second,
            speed = fix.speed,
            dist_moved_km = dist_moved,
            "No report trigger fired"
        );
        None
    }

    /// Overwrites the state as a unit from the fix that was just reported.
    pub fn commit(&mut self, fix: &PositionFix) {
        self.last_lat = fix.latitude;
        self.last_lon = fix.longitude;
        self.last_track = fix.track;
        self.last_speed = fix.speed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(lat: f64, lon: f64, speed: f64, track: f64) -> PositionFix {
        PositionFix {
            latitude: lat,
            longitude: lon,
            altitude: 20.0,
            speed,
            track,
            epx: 1.0,
            epy: 1.0,
            epv: 2.0,
        }
    }

    /// State as if the last report was sent from the given fix.
    fn state_from(f: &PositionFix) -> ReportState {
        let mut state = ReportState::new();
        state.commit(f);
        state
    }

    /// Config with all periodic rules disabled; event rules stay active.
    fn event_only_config() -> TriggerConfig {
        TriggerConfig {
            int_always: 0,
            int_full: 0,
            int_move: 0,
            int_track: 0,
            ..Default::default()
        }
    }

    // ── Rule 1: unconditional interval ──────────────────────────────────

    #[test]
    fn test_unconditional_interval_fires_on_boundary() {
        let config = TriggerConfig {
            int_always: 60,
            ..event_only_config()
        };
        let stationary = fix(53.5, 10.0, 0.0, 0.0);
        let state = state_from(&stationary);

        assert_eq!(
            state.evaluate(&config, &stationary, 120),
            ReportDecision::Basic(ReportTrigger::Interval)
        );
        assert_eq!(
            state.evaluate(&config, &stationary, 121),
            ReportDecision::NoReport
        );
    }

    #[test]
    fn test_zero_interval_disables_rule() {
        let config = event_only_config();
        let stationary = fix(53.5, 10.0, 0.0, 0.0);
        let state = state_from(&stationary);

        // Without int_always, no boundary ever fires for a stationary fix
        for second in 0..600 {
            assert_eq!(
                state.evaluate(&config, &stationary, second),
                ReportDecision::NoReport
            );
        }
    }

    // ── Rule 2: speed change ────────────────────────────────────────────

    #[test]
    fn test_speed_delta_above_threshold_forces_report() {
        let config = event_only_config(); // chg_speed = 10 km/h
        let state = state_from(&fix(53.5, 10.0, 50.0, 90.0));

        // delta 11 > 10: report
        let faster = fix(53.5, 10.0, 61.0, 90.0);
        assert_eq!(
            state.evaluate(&config, &faster, 7),
            ReportDecision::Basic(ReportTrigger::SpeedChange)
        );

        // braking counts the same way
        let slower = fix(53.5, 10.0, 39.0, 90.0);
        assert_eq!(
            state.evaluate(&config, &slower, 7),
            ReportDecision::Basic(ReportTrigger::SpeedChange)
        );
    }

    #[test]
    fn test_speed_delta_at_threshold_does_not_fire() {
        let config = event_only_config();
        let state = state_from(&fix(53.5, 10.0, 50.0, 90.0));

        // delta 9 <= 10: no report (strictly greater-than)
        let slightly_faster = fix(53.5, 10.0, 59.0, 90.0);
        assert_eq!(
            state.evaluate(&config, &slightly_faster, 7),
            ReportDecision::NoReport
        );

        // delta exactly 10: still no report
        let at_threshold = fix(53.5, 10.0, 60.0, 90.0);
        assert_eq!(
            state.evaluate(&config, &at_threshold, 7),
            ReportDecision::NoReport
        );
    }

    // ── Rules 3/4: motion start and stop ────────────────────────────────

    #[test]
    fn test_motion_start_always_reports() {
        let config = event_only_config();
        let state = state_from(&fix(53.5, 10.0, 0.0, 0.0));

        let moving = fix(53.5, 10.0, 5.0, 45.0);
        assert_eq!(
            state.evaluate(&config, &moving, 3),
            ReportDecision::Basic(ReportTrigger::MotionStart)
        );
    }

    #[test]
    fn test_motion_stop_always_reports() {
        let config = event_only_config();
        let state = state_from(&fix(53.5, 10.0, 5.0, 45.0));

        let stopped = fix(53.5, 10.0, 0.0, 45.0);
        assert_eq!(
            state.evaluate(&config, &stopped, 3),
            ReportDecision::Basic(ReportTrigger::MotionStop)
        );
    }

    #[test]
    fn test_hard_accel_from_standstill_reports_as_speed_change() {
        // Speed change outranks motion start in the priority order
        let config = event_only_config();
        let state = state_from(&fix(53.5, 10.0, 0.0, 0.0));

        let fast = fix(53.5, 10.0, 30.0, 45.0);
        assert_eq!(
            state.evaluate(&config, &fast, 3),
            ReportDecision::Basic(ReportTrigger::SpeedChange)
        );
    }

    // ── Rule 5: in-motion cadences ──────────────────────────────────────

    #[test]
    fn test_move_interval_requires_displacement() {
        let config = TriggerConfig {
            int_move: 10,
            ..event_only_config()
        };
        // ~1.1 km north of the last report, cruising at steady speed
        let state = state_from(&fix(53.50, 10.0, 50.0, 0.0));
        let cruising = fix(53.51, 10.0, 50.0, 0.0);

        assert_eq!(
            state.evaluate(&config, &cruising, 20),
            ReportDecision::Basic(ReportTrigger::MoveInterval)
        );
        assert_eq!(
            state.evaluate(&config, &cruising, 21),
            ReportDecision::NoReport
        );

        // Same tick but no displacement: nothing fires
        let parked = fix(53.50, 10.0, 50.0, 0.0);
        assert_eq!(
            state.evaluate(&config, &parked, 20),
            ReportDecision::NoReport
        );
    }

    #[test]
    fn test_track_change_reports_only_on_track_boundary() {
        let config = TriggerConfig {
            int_track: 2,
            ..event_only_config()
        };
        let state = state_from(&fix(53.50, 10.0, 50.0, 10.0));
        // Displaced and turned by 20 degrees
        let turning = fix(53.51, 10.0, 50.0, 30.0);

        assert_eq!(
            state.evaluate(&config, &turning, 4),
            ReportDecision::Basic(ReportTrigger::TrackChange)
        );
        // Off the int_track boundary: no report even though turning
        assert_eq!(
            state.evaluate(&config, &turning, 5),
            ReportDecision::NoReport
        );
    }

    #[test]
    fn test_track_change_below_threshold_does_not_fire() {
        let config = TriggerConfig {
            int_track: 2,
            ..event_only_config()
        };
        let state = state_from(&fix(53.50, 10.0, 50.0, 10.0));
        // Only 4 degrees of track change (threshold is 5)
        let drifting = fix(53.51, 10.0, 50.0, 14.0);

        assert_eq!(
            state.evaluate(&config, &drifting, 4),
            ReportDecision::NoReport
        );
    }

    #[test]
    fn test_track_change_across_north_wraparound() {
        let config = TriggerConfig {
            int_track: 2,
            ..event_only_config()
        };
        let state = state_from(&fix(53.50, 10.0, 50.0, 350.0));
        // 350° → 10° is a 20° turn, not 340°
        let turning = fix(53.51, 10.0, 50.0, 10.0);

        assert_eq!(
            state.evaluate(&config, &turning, 4),
            ReportDecision::Basic(ReportTrigger::TrackChange)
        );
    }

    #[test]
    fn test_move_interval_outranks_track_change() {
        let config = TriggerConfig {
            int_move: 10,
            int_track: 2,
            ..event_only_config()
        };
        let state = state_from(&fix(53.50, 10.0, 50.0, 10.0));
        let turning = fix(53.51, 10.0, 50.0, 30.0);

        // Second 20 is on both boundaries; move-interval wins
        assert_eq!(
            state.evaluate(&config, &turning, 20),
            ReportDecision::Basic(ReportTrigger::MoveInterval)
        );
    }

    // ── Priority and single-report guarantees ───────────────────────────

    #[test]
    fn test_interval_and_stop_coincide_reports_once_as_interval() {
        let config = TriggerConfig {
            int_always: 60,
            ..event_only_config()
        };
        let state = state_from(&fix(53.5, 10.0, 5.0, 45.0));
        let stopped = fix(53.5, 10.0, 0.0, 45.0);

        // Tick satisfies both rule 1 and rule 4; exactly one decision,
        // attributed to the higher-priority rule
        assert_eq!(
            state.evaluate(&config, &stopped, 60),
            ReportDecision::Basic(ReportTrigger::Interval)
        );
    }

    // ── Variant selection ───────────────────────────────────────────────

    #[test]
    fn test_full_variant_on_int_full_boundary() {
        let config = TriggerConfig {
            int_always: 60,
            int_full: 120,
            ..event_only_config()
        };
        let stationary = fix(53.5, 10.0, 0.0, 0.0);
        let state = state_from(&stationary);

        assert_eq!(
            state.evaluate(&config, &stationary, 120),
            ReportDecision::Full(ReportTrigger::Interval)
        );
        assert_eq!(
            state.evaluate(&config, &stationary, 60),
            ReportDecision::Basic(ReportTrigger::Interval)
        );
    }

    #[test]
    fn test_int_full_never_triggers_on_its_own() {
        // int_full boundary but no trigger rule fires: no report at all
        let config = TriggerConfig {
            int_full: 30,
            ..event_only_config()
        };
        let stationary = fix(53.5, 10.0, 0.0, 0.0);
        let state = state_from(&stationary);

        assert_eq!(
            state.evaluate(&config, &stationary, 30),
            ReportDecision::NoReport
        );
    }

    #[test]
    fn test_event_triggers_upgrade_to_full_on_boundary() {
        let config = TriggerConfig {
            int_full: 10,
            ..event_only_config()
        };
        let state = state_from(&fix(53.5, 10.0, 0.0, 0.0));
        let moving = fix(53.5, 10.0, 5.0, 45.0);

        assert_eq!(
            state.evaluate(&config, &moving, 10),
            ReportDecision::Full(ReportTrigger::MotionStart)
        );
        assert_eq!(
            state.evaluate(&config, &moving, 11),
            ReportDecision::Basic(ReportTrigger::MotionStart)
        );
    }

    // ── State lifecycle ─────────────────────────────────────────────────

    #[test]
    fn test_commit_overwrites_state_as_unit() {
        let mut state = ReportState::new();
        let f = fix(53.5, 10.0, 42.0, 271.5);
        state.commit(&f);

        assert_eq!(state.last_lat, 53.5);
        assert_eq!(state.last_lon, 10.0);
        assert_eq!(state.last_speed, 42.0);
        assert_eq!(state.last_track, 271.5);
    }

    #[test]
    fn test_initial_state_is_zeroed() {
        let state = ReportState::new();
        assert_eq!(state, ReportState {
            last_lat: 0.0,
            last_lon: 0.0,
            last_track: 0.0,
            last_speed: 0.0,
        });
    }

    #[test]
    fn test_decision_accessors() {
        assert!(!ReportDecision::NoReport.is_report());
        assert!(ReportDecision::Basic(ReportTrigger::Interval).is_report());
        assert!(ReportDecision::Full(ReportTrigger::MotionStop).is_report());

        assert_eq!(ReportDecision::NoReport.trigger(), None);
        assert_eq!(
            ReportDecision::Full(ReportTrigger::MotionStop).trigger(),
            Some(ReportTrigger::MotionStop)
        );
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(ReportTrigger::Interval.to_string(), "interval");
        assert_eq!(ReportTrigger::MotionStart.to_string(), "motion-start");
        assert_eq!(ReportTrigger::TrackChange.to_string(), "track-change");
    }
}
