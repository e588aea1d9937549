//! # Spin-up gate
//!
//! Races "group at target" against a timeout, releasing the feed on whichever is observed first.
//! The gate only tracks the sequence, the owner commands the actuators based on its state.
//!
//! ```text
//!  Idle --start--> SpinningUp --at target / timed out--> Feeding
//!   ^                  |                                    |
//!   +------cancel------+----------------cancel--------------+
//! ```
//!
//! If the group is at target on the same cycle the timeout expires the outcome is
//! [`SpinUpOutcome::TargetReached`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SpinUpGate {
    state: GateState,

    /// Result of the most recent spin up, kept after the sequence ends
    last_outcome: Option<SpinUpOutcome>,

    /// Time taken by the most recent spin up
    ///
    /// Units: seconds
    last_spin_up_time_s: Option<f64>,
}

/// Values captured when a spin up starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpinUp {
    /// Units: seconds
    pub start_time_s: f64,

    /// Units: mechanism rpm
    pub target_rpm: f64,

    /// Fraction of the target
    pub tolerance: f64,

    /// Units: seconds
    pub timeout_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum GateState {
    Idle,

    SpinningUp(SpinUp),

    Feeding {
        spin_up: SpinUp,
        outcome: SpinUpOutcome,

        /// Units: seconds
        feed_start_time_s: f64,
    },
}

/// How the spin up ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpinUpOutcome {
    TargetReached,
    TimedOut,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for GateState {
    fn default() -> Self {
        GateState::Idle
    }
}

impl SpinUpGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new spin up, replacing any active one.
    pub fn start(&mut self, spin_up: SpinUp) {
        info!(
            "Spinning up to {:.0} rpm (tolerance {:.3}, timeout {:.2} s)",
            spin_up.target_rpm, spin_up.tolerance, spin_up.timeout_s
        );

        self.state = GateState::SpinningUp(spin_up);
    }

    /// Evaluate the race for this cycle.
    ///
    /// Returns the outcome on the cycle the gate moves to `Feeding`, `None` otherwise.
    pub fn update(&mut self, time_s: f64, at_target: bool) -> Option<SpinUpOutcome> {
        let spin_up = match self.state {
            GateState::SpinningUp(s) => s,
            _ => return None,
        };

        let elapsed_s = time_s - spin_up.start_time_s;

        let outcome = if at_target {
            SpinUpOutcome::TargetReached
        } else if elapsed_s >= spin_up.timeout_s {
            SpinUpOutcome::TimedOut
        } else {
            return None;
        };

        match outcome {
            SpinUpOutcome::TargetReached => {
                info!("Target reached after {:.2} s, feeding", elapsed_s)
            }
            SpinUpOutcome::TimedOut => info!(
                "Spin up timed out after {:.2} s without reaching the target, feeding anyway",
                elapsed_s
            ),
        }

        self.last_outcome = Some(outcome);
        self.last_spin_up_time_s = Some(elapsed_s);
        self.state = GateState::Feeding {
            spin_up,
            outcome,
            feed_start_time_s: time_s,
        };

        Some(outcome)
    }

    /// Return to `Idle`. Returns true if a sequence was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        self.state = GateState::Idle;
        was_active
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, GateState::Idle)
    }

    pub fn is_feeding(&self) -> bool {
        matches!(self.state, GateState::Feeding { .. })
    }

    /// Values captured at the start of the active sequence.
    pub fn spin_up(&self) -> Option<SpinUp> {
        match self.state {
            GateState::Idle => None,
            GateState::SpinningUp(s) => Some(s),
            GateState::Feeding { spin_up, .. } => Some(spin_up),
        }
    }

    /// Time since the active sequence started, zero when idle.
    pub fn elapsed_s(&self, time_s: f64) -> f64 {
        self.spin_up()
            .map(|s| (time_s - s.start_time_s).max(0.0))
            .unwrap_or(0.0)
    }

    /// Time left before the spin up times out, zero when idle or feeding.
    pub fn remaining_timeout_s(&self, time_s: f64) -> f64 {
        match self.state {
            GateState::SpinningUp(s) => (s.timeout_s - (time_s - s.start_time_s)).max(0.0),
            _ => 0.0,
        }
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            GateState::Idle => "Idle",
            GateState::SpinningUp(_) => "SpinningUp",
            GateState::Feeding { .. } => "Feeding",
        }
    }

    pub fn last_outcome(&self) -> Option<SpinUpOutcome> {
        self.last_outcome
    }

    pub fn last_spin_up_time_s(&self) -> Option<f64> {
        self.last_spin_up_time_s
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn spin_up(start_time_s: f64) -> SpinUp {
        SpinUp {
            start_time_s,
            target_rpm: 3000.0,
            tolerance: 0.05,
            timeout_s: 3.0,
        }
    }

    /// Run the gate from cycle 0 at 50 Hz and return the cycle it started feeding on.
    fn run(target_cycle: Option<u32>) -> (u32, SpinUpOutcome) {
        let mut gate = SpinUpGate::new();
        gate.start(spin_up(0.0));

        for k in 0..1000 {
            let t = k as f64 / 50.0;
            let at_target = target_cycle.map(|c| k >= c).unwrap_or(false);

            if let Some(o) = gate.update(t, at_target) {
                return (k, o);
            }
        }

        panic!("gate never fed");
    }

    #[test]
    fn test_race() {
        // Target before timeout
        assert_eq!(run(Some(60)), (60, SpinUpOutcome::TargetReached));

        // Timeout before target
        assert_eq!(run(Some(400)), (150, SpinUpOutcome::TimedOut));
        assert_eq!(run(None), (150, SpinUpOutcome::TimedOut));

        // Both on the same cycle
        assert_eq!(run(Some(150)), (150, SpinUpOutcome::TargetReached));
    }

    #[test]
    fn test_feeding_is_terminal_until_cancel() {
        let mut gate = SpinUpGate::new();
        gate.start(spin_up(1.0));

        assert_eq!(gate.update(1.5, false), None);
        assert_eq!(gate.state_name(), "SpinningUp");
        assert!((gate.remaining_timeout_s(1.5) - 2.5).abs() < 1e-9);

        assert_eq!(gate.update(2.0, true), Some(SpinUpOutcome::TargetReached));
        assert!(gate.is_feeding());
        assert_eq!(gate.remaining_timeout_s(2.5), 0.0);
        assert!((gate.elapsed_s(2.5) - 1.5).abs() < 1e-9);

        // Further updates change nothing
        assert_eq!(gate.update(10.0, false), None);
        assert!(gate.is_feeding());

        assert!(gate.cancel());
        assert_eq!(gate.state(), GateState::Idle);
        assert!(!gate.cancel());

        assert_eq!(gate.last_outcome(), Some(SpinUpOutcome::TargetReached));
        assert!((gate.last_spin_up_time_s().unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(gate.elapsed_s(3.0), 0.0);
    }

    #[test]
    fn test_cancel_while_spinning_up() {
        let mut gate = SpinUpGate::new();
        gate.start(spin_up(0.0));

        assert!(gate.cancel());
        assert!(!gate.is_active());
        assert_eq!(gate.update(5.0, true), None);
        assert_eq!(gate.last_outcome(), None);
    }
}
