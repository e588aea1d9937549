//! Telemetry produced by ShooterCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::{act_driver::SignalStatus, spin_up_gate::SpinUpOutcome};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Shooter telemetry, produced once per cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShooterTm {
    /// Units: seconds
    pub time_s: f64,

    /// Name of the command being executed, if any
    pub active_cmd: Option<&'static str>,

    // ---- FLYWHEELS ----

    /// True if the flywheels are being driven
    pub running: bool,

    /// Units: flywheel rpm
    pub target_rpm: f64,

    /// Units: flywheel rpm
    pub mean_rpm: f64,

    /// Target minus mean
    ///
    /// Units: flywheel rpm
    pub rpm_error: f64,

    pub at_target: bool,

    /// Flywheels running and at target
    pub ready_to_feed: bool,

    /// Leader first
    ///
    /// Units: flywheel rpm
    pub unit_rpm: Vec<f64>,

    pub unit_status: Vec<SignalStatus>,

    /// Units: flywheel rpm
    pub spread_rpm: f64,

    /// Spread above the allowed maximum
    pub desync: bool,

    /// Units: amps
    pub total_current_a: f64,

    /// Units: degrees celsius
    pub max_temperature_c: f64,

    // ---- FEED ----

    pub feed_running: bool,

    pub feed_duty: f64,

    /// Units: rotor rpm
    pub feed_rpm: f64,

    /// Units: amps
    pub feed_current_a: f64,

    /// Units: degrees celsius
    pub feed_temperature_c: f64,

    // ---- SEQUENCE ----

    pub sequence_state: SequenceState,

    /// Units: seconds
    pub elapsed_s: f64,

    /// Units: seconds
    pub remaining_timeout_s: f64,

    pub last_outcome: Option<SpinUpOutcome>,

    /// Units: seconds
    pub last_spin_up_time_s: Option<f64>,
}

/// Flat version of [`ShooterTm`] which can be written as a CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct ShooterTmRecord {
    pub time_s: f64,
    pub active_cmd: &'static str,
    pub running: bool,
    pub target_rpm: f64,
    pub mean_rpm: f64,
    pub rpm_error: f64,
    pub at_target: bool,
    pub ready_to_feed: bool,
    /// `;` separated, leader first
    pub unit_rpm: String,
    pub spread_rpm: f64,
    pub desync: bool,
    pub total_current_a: f64,
    pub max_temperature_c: f64,
    pub feed_running: bool,
    pub feed_duty: f64,
    pub feed_rpm: f64,
    pub feed_current_a: f64,
    pub feed_temperature_c: f64,
    pub sequence_state: SequenceState,
    pub elapsed_s: f64,
    pub remaining_timeout_s: f64,
    pub last_outcome: Option<SpinUpOutcome>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// State of the spin-up sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SequenceState {
    Idle,
    SpinningUp,
    Feeding,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SequenceState {
    fn default() -> Self {
        SequenceState::Idle
    }
}

impl From<&ShooterTm> for ShooterTmRecord {
    fn from(tm: &ShooterTm) -> Self {
        Self {
            time_s: tm.time_s,
            active_cmd: tm.active_cmd.unwrap_or("None"),
            running: tm.running,
            target_rpm: tm.target_rpm,
            mean_rpm: tm.mean_rpm,
            rpm_error: tm.rpm_error,
            at_target: tm.at_target,
            ready_to_feed: tm.ready_to_feed,
            unit_rpm: tm
                .unit_rpm
                .iter()
                .map(|r| format!("{:.1}", r))
                .collect::<Vec<_>>()
                .join(";"),
            spread_rpm: tm.spread_rpm,
            desync: tm.desync,
            total_current_a: tm.total_current_a,
            max_temperature_c: tm.max_temperature_c,
            feed_running: tm.feed_running,
            feed_duty: tm.feed_duty,
            feed_rpm: tm.feed_rpm,
            feed_current_a: tm.feed_current_a,
            feed_temperature_c: tm.feed_temperature_c,
            sequence_state: tm.sequence_state,
            elapsed_s: tm.elapsed_s,
            remaining_timeout_s: tm.remaining_timeout_s,
            last_outcome: tm.last_outcome,
        }
    }
}

impl ShooterTm {
    /// One line summary for the log.
    pub fn summary(&self) -> String {
        format!(
            "{} | {:?} | target {:.0} rpm, mean {:.0} rpm, spread {:.0} rpm | feed {:.2}, {:.1} C | {:.1} A, {:.1} C",
            self.active_cmd.unwrap_or("Idle"),
            self.sequence_state,
            self.target_rpm,
            self.mean_rpm,
            self.spread_rpm,
            self.feed_duty,
            self.feed_temperature_c,
            self.total_current_a,
            self.max_temperature_c
        )
    }
}
