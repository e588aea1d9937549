//! Parameters structure for ShooterCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ParamsError;
use comms_if::eqpt::act::{ActConfig, ActId, CurrentLimits, Gains, NeutralMode};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for shooter control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {

    // ---- HARDWARE ----

    /// Flywheel actuator which receives the velocity demands
    pub leader_id: ActId,

    /// Flywheel actuators which follow the leader
    pub follower_ids: Vec<ActId>,

    pub feed_id: ActId,

    /// Motor rotations per flywheel rotation
    pub gear_ratio: f64,

    pub flywheel_current_limits: CurrentLimits,

    pub feed_current_limits: CurrentLimits,

    pub flywheel_neutral_mode: NeutralMode,

    pub feed_neutral_mode: NeutralMode,

    #[serde(default)]
    pub feed_inverted: bool,

    // ---- CONTROL ----

    /// Targets below this magnitude are treated as "stopped" when checking if the flywheels are
    /// at target.
    ///
    /// Units: flywheel rpm
    pub at_target_floor_rpm: f64,

    /// Velocity spread above which the flywheels are reported as desynchronised.
    ///
    /// Units: flywheel rpm
    pub max_spread_rpm: f64,

    // ---- EJECT ----

    /// Units: flywheel rpm
    pub eject_rpm: f64,

    pub eject_feed_duty: f64,

    // ---- TUNABLES ----

    /// Values used for tunables which are not in the tunable store
    #[serde(default)]
    pub tunables: TunableDefaults,
}

/// Defaults for the live tunables.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TunableDefaults {
    /// Units: flywheel rpm
    pub target_rpm: f64,

    pub k_p: f64,
    pub k_v: f64,
    pub k_s: f64,

    pub feed_output: f64,

    /// Fraction of the target
    pub spin_up_tolerance: f64,

    /// Units: seconds
    pub spin_up_timeout_s: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            leader_id: ActId(1),
            follower_ids: vec![ActId(2), ActId(3)],
            feed_id: ActId(4),
            gear_ratio: 1.5,
            flywheel_current_limits: CurrentLimits {
                supply_a: Some(45.0),
                stator_a: Some(60.0),
            },
            feed_current_limits: CurrentLimits {
                supply_a: Some(45.0),
                stator_a: Some(75.0),
            },
            flywheel_neutral_mode: NeutralMode::Coast,
            feed_neutral_mode: NeutralMode::Brake,
            feed_inverted: false,
            at_target_floor_rpm: 50.0,
            max_spread_rpm: 200.0,
            eject_rpm: -2000.0,
            eject_feed_duty: -0.5,
            tunables: TunableDefaults::default(),
        }
    }
}

impl Default for TunableDefaults {
    fn default() -> Self {
        Self {
            target_rpm: 0.0,
            k_p: 0.1,
            k_v: 0.12,
            k_s: 0.0,
            feed_output: 0.25,
            spin_up_tolerance: 0.05,
            spin_up_timeout_s: 3.0,
        }
    }
}

impl Params {
    /// Check the parameters are usable.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if !(self.gear_ratio.is_finite() && self.gear_ratio > 0.0) {
            return Err(ParamsError::InvalidGearRatio(self.gear_ratio));
        }

        let mut ids = HashSet::new();
        let all_ids = std::iter::once(self.leader_id)
            .chain(self.follower_ids.iter().copied())
            .chain(std::iter::once(self.feed_id));
        for id in all_ids {
            if !ids.insert(id) {
                return Err(ParamsError::DuplicateActId(id));
            }
        }

        for (name, duty) in [
            ("eject_feed_duty", self.eject_feed_duty),
            ("tunables.feed_output", self.tunables.feed_output),
        ]
        .iter()
        {
            if !(duty.is_finite() && duty.abs() <= 1.0) {
                return Err(ParamsError::InvalidDutyCycle(*name, *duty));
            }
        }

        for (name, value) in [
            ("at_target_floor_rpm", self.at_target_floor_rpm),
            ("max_spread_rpm", self.max_spread_rpm),
            ("tunables.spin_up_tolerance", self.tunables.spin_up_tolerance),
            ("tunables.spin_up_timeout_s", self.tunables.spin_up_timeout_s),
        ]
        .iter()
        {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ParamsError::InvalidValue(*name, *value));
            }
        }

        if !self.eject_rpm.is_finite() {
            return Err(ParamsError::InvalidValue("eject_rpm", self.eject_rpm));
        }

        Ok(())
    }

    /// Configuration of the flywheel actuators with the given gains.
    pub fn flywheel_config(&self, gains: Gains) -> ActConfig {
        ActConfig {
            gains,
            current_limits: self.flywheel_current_limits,
            neutral_mode: self.flywheel_neutral_mode,
            inverted: false,
        }
    }

    pub fn feed_config(&self) -> ActConfig {
        ActConfig {
            gains: Gains::default(),
            current_limits: self.feed_current_limits,
            neutral_mode: self.feed_neutral_mode,
            inverted: self.feed_inverted,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(Params::default().are_valid().is_ok());
    }

    #[test]
    fn test_invalid() {
        let mut p = Params::default();
        p.gear_ratio = 0.0;
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidGearRatio(_))));

        let mut p = Params::default();
        p.feed_id = ActId(2);
        assert!(matches!(p.are_valid(), Err(ParamsError::DuplicateActId(ActId(2)))));

        let mut p = Params::default();
        p.eject_feed_duty = -1.5;
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidDutyCycle(..))));

        let mut p = Params::default();
        p.tunables.spin_up_timeout_s = -1.0;
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidValue(..))));
    }

    #[test]
    fn test_from_toml() {
        let p: Params = util::params::from_str(
            r#"
            leader_id = 11
            follower_ids = [12]
            feed_id = 20
            gear_ratio = 2.0
            flywheel_current_limits = { supply_a = 40.0 }
            feed_current_limits = { supply_a = 45.0, stator_a = 75.0 }
            flywheel_neutral_mode = "Coast"
            feed_neutral_mode = "Brake"
            at_target_floor_rpm = 50.0
            max_spread_rpm = 150.0
            eject_rpm = -1500.0
            eject_feed_duty = -0.4

            [tunables]
            target_rpm = 2500.0
            "#,
        )
        .unwrap();

        assert_eq!(p.follower_ids, vec![ActId(12)]);
        assert_eq!(p.flywheel_current_limits.stator_a, None);
        assert_eq!(p.feed_neutral_mode, NeutralMode::Brake);
        assert_eq!(p.tunables.target_rpm, 2500.0);
        assert_eq!(p.tunables.k_v, 0.12);
        assert!(p.are_valid().is_ok());
    }
}
