//! # Actuator group
//!
//! A leader actuator plus any number of mechanically coupled followers driving the same
//! mechanism. Only the leader is commanded each cycle, the followers mirror it through a standing
//! follow relationship which is re-declared whenever the group is stopped or configured.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::Serialize;

// Internal
use crate::act_driver::{ActDriver, Signal, SignalStatus};
use comms_if::eqpt::act::{ActConfig, ActDem, ActError, ActId};
use util::maths;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Below this magnitude a target is treated as "stopped" by [`ActuatorGroup::is_at_target`].
///
/// Units: mechanism rpm
pub const DEFAULT_AT_TARGET_FLOOR_RPM: f64 = 50.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct ActuatorGroup {
    leader: Box<dyn ActDriver>,
    followers: Vec<Box<dyn ActDriver>>,

    /// Motor rotations per mechanism rotation
    gear_ratio: f64,

    at_target_floor_rpm: f64,

    state: GroupState,

    /// Configuration successfully applied to every unit, `None` if the last attempt failed
    applied_config: Option<ActConfig>,

    // Per-unit signals, index 0 is the leader followed by the followers in order
    velocity_rps: Vec<Signal>,
    current_a: Vec<Signal>,
    temperature_c: Vec<Signal>,

    /// Mean mechanism velocity over the units with usable readings
    mean_rpm: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Command state of the group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum GroupState {
    Off,

    Running {
        /// Units: mechanism rpm
        target_rpm: f64,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActuatorGroup {
    /// Create a new group. The group is `Off` and unconfigured until [`Self::configure`] is
    /// called.
    pub fn new(
        leader: Box<dyn ActDriver>,
        followers: Vec<Box<dyn ActDriver>>,
        gear_ratio: f64,
    ) -> Self {
        let num_units = followers.len() + 1;

        Self {
            leader,
            followers,
            gear_ratio,
            at_target_floor_rpm: DEFAULT_AT_TARGET_FLOOR_RPM,
            state: GroupState::Off,
            applied_config: None,
            velocity_rps: vec![Signal::default(); num_units],
            current_a: vec![Signal::default(); num_units],
            temperature_c: vec![Signal::default(); num_units],
            mean_rpm: 0.0,
        }
    }

    pub fn set_gear_ratio(&mut self, gear_ratio: f64) {
        self.gear_ratio = gear_ratio;
    }

    pub fn set_at_target_floor_rpm(&mut self, floor_rpm: f64) {
        self.at_target_floor_rpm = floor_rpm;
    }

    /// Apply the configuration to the leader and every follower, then re-declare the follow
    /// relationship.
    ///
    /// Does nothing if the same configuration has already been applied successfully. If any unit
    /// fails the configuration is marked unapplied, so the next call tries again, and the first
    /// error is returned. Units which did accept it keep it.
    pub fn configure(&mut self, config: &ActConfig) -> Result<(), ActError> {
        if self.applied_config.as_ref() == Some(config) {
            debug!("Group configuration unchanged, not reapplied");
            return Ok(());
        }

        let mut first_err = None;

        for unit in std::iter::once(&mut self.leader).chain(self.followers.iter_mut()) {
            if let Err(e) = unit.configure(config) {
                error!("Failed to configure actuator {}: {}", unit.id(), e);
                first_err.get_or_insert(e);
            }
        }

        self.reassert_followers();

        match first_err {
            Some(e) => {
                self.applied_config = None;
                Err(e)
            }
            None => {
                info!(
                    "Group configured: kP = {}, kV = {}, kS = {}",
                    config.gains.k_p, config.gains.k_v, config.gains.k_s
                );
                self.applied_config = Some(*config);
                Ok(())
            }
        }
    }

    /// Re-issue the follow demand to every follower.
    pub fn reassert_followers(&mut self) {
        let leader_id = self.leader.id();

        for follower in self.followers.iter_mut() {
            if let Err(e) = follower.command(ActDem::Follow(leader_id)) {
                warn!("Could not make {} follow {}: {}", follower.id(), leader_id, e);
            }
        }
    }

    /// Command the leader to the given mechanism velocity.
    pub fn run_at_velocity(&mut self, target_rpm: f64) {
        let dem = ActDem::Velocity(self.rpm_to_rps(target_rpm));

        trace!("Group leader demand: {:?}", dem);

        if let Err(e) = self.leader.command(dem) {
            warn!("Group leader command failed: {}", e);
        }

        self.state = GroupState::Running { target_rpm };
    }

    /// Put the leader in neutral and re-declare the follow relationship.
    pub fn stop(&mut self) {
        if let Err(e) = self.leader.command(ActDem::Neutral) {
            warn!("Group leader stop command failed: {}", e);
        }

        self.reassert_followers();

        self.state = GroupState::Off;
    }

    /// Read the measurements from every unit.
    ///
    /// Never fails, see [`Signal`] for how read faults are handled.
    pub fn refresh(&mut self) {
        let units = std::iter::once(&mut self.leader).chain(self.followers.iter_mut());
        let signals = self
            .velocity_rps
            .iter_mut()
            .zip(self.current_a.iter_mut())
            .zip(self.temperature_c.iter_mut());

        for (unit, ((vel, cur), temp)) in units.zip(signals) {
            let prev = vel.status();

            match (prev, vel.update(unit.measured_velocity_rps())) {
                (SignalStatus::Fresh, SignalStatus::Held) => warn!(
                    "Velocity read from {} failed, holding {:.1} rev/s",
                    unit.id(),
                    vel.value()
                ),
                (SignalStatus::Held, SignalStatus::Lost) => warn!(
                    "Velocity of {} lost, excluded from the group velocity",
                    unit.id()
                ),
                (SignalStatus::Held, SignalStatus::Fresh) | (SignalStatus::Lost, SignalStatus::Fresh) => {
                    debug!("Velocity of {} available", unit.id())
                }
                _ => (),
            }

            // Current and temperature keep their last good value on failure
            cur.update(unit.measured_current_a());
            temp.update(unit.measured_temperature_c());
        }

        if let Some(mean) = maths::mean(&self.usable_velocities_rpm()) {
            self.mean_rpm = mean;
        }
    }

    /// Returns true if the measured group velocity is at the given target.
    ///
    /// For targets smaller in magnitude than the floor the group must be below the floor,
    /// otherwise the group must be within `|target| * tolerance` of the target.
    pub fn is_at_target(&self, target_rpm: f64, tolerance: f64) -> bool {
        if target_rpm.abs() < self.at_target_floor_rpm {
            self.mean_rpm.abs() < self.at_target_floor_rpm
        } else {
            (self.mean_rpm - target_rpm).abs() < target_rpm.abs() * tolerance
        }
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, GroupState::Running { .. })
    }

    pub fn leader_id(&self) -> ActId {
        self.leader.id()
    }

    pub fn follower_ids(&self) -> Vec<ActId> {
        self.followers.iter().map(|f| f.id()).collect()
    }

    /// Mean mechanism velocity of the units with usable readings.
    ///
    /// If no unit has a usable reading the previous mean is kept.
    pub fn mean_velocity_rpm(&self) -> f64 {
        self.mean_rpm
    }

    /// Last good mechanism velocity of every unit, leader first.
    pub fn unit_velocities_rpm(&self) -> Vec<f64> {
        self.velocity_rps
            .iter()
            .map(|s| self.rps_to_rpm(s.value()))
            .collect()
    }

    pub fn unit_velocity_status(&self) -> Vec<SignalStatus> {
        self.velocity_rps.iter().map(|s| s.status()).collect()
    }

    /// Difference between the fastest and slowest unit with a usable reading.
    pub fn velocity_spread_rpm(&self) -> f64 {
        maths::spread(&self.usable_velocities_rpm()).unwrap_or(0.0)
    }

    /// Units: amps
    pub fn total_current_a(&self) -> f64 {
        self.current_a.iter().map(|s| s.value()).sum()
    }

    /// Units: degrees celsius
    pub fn max_temperature_c(&self) -> f64 {
        self.temperature_c
            .iter()
            .map(|s| s.value())
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn usable_velocities_rpm(&self) -> Vec<f64> {
        self.velocity_rps
            .iter()
            .filter_map(|s| s.usable())
            .map(|v| self.rps_to_rpm(v))
            .collect()
    }

    fn rpm_to_rps(&self, rpm: f64) -> f64 {
        rpm / 60.0 * self.gear_ratio
    }

    fn rps_to_rpm(&self, rps: f64) -> f64 {
        rps * 60.0 / self.gear_ratio
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::act_driver::sim::{SimBus, SimParams};
    use comms_if::eqpt::act::Gains;

    const GEAR: f64 = 1.5;

    fn group(bus: &SimBus) -> ActuatorGroup {
        ActuatorGroup::new(
            Box::new(bus.driver(ActId(1))),
            vec![Box::new(bus.driver(ActId(2))), Box::new(bus.driver(ActId(3)))],
            GEAR,
        )
    }

    fn force_rpm(bus: &SimBus, id: u8, rpm: f64) {
        bus.force_velocity(ActId(id), Some(rpm / 60.0 * GEAR));
    }

    fn force_all_rpm(bus: &SimBus, rpm: f64) {
        for id in 1..=3 {
            force_rpm(bus, id, rpm);
        }
    }

    fn config(k_p: f64) -> ActConfig {
        ActConfig {
            gains: Gains {
                k_p,
                k_v: 0.12,
                k_s: 0.0,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_run_commands_leader_only() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        g.run_at_velocity(3000.0);

        assert_eq!(bus.demand(ActId(1)), Some(ActDem::Velocity(75.0)));
        assert!(bus.command_log(ActId(2)).is_empty());
        assert!(bus.command_log(ActId(3)).is_empty());
        assert_eq!(g.state(), GroupState::Running { target_rpm: 3000.0 });
    }

    #[test]
    fn test_stop_reasserts_followers() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        g.run_at_velocity(3000.0);
        g.stop();

        assert_eq!(bus.demand(ActId(1)), Some(ActDem::Neutral));
        assert_eq!(bus.command_log(ActId(2)), vec![ActDem::Follow(ActId(1))]);
        assert_eq!(bus.command_log(ActId(3)), vec![ActDem::Follow(ActId(1))]);
        assert_eq!(g.state(), GroupState::Off);
    }

    #[test]
    fn test_configure_idempotent() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        g.configure(&config(0.1)).unwrap();
        g.configure(&config(0.1)).unwrap();
        g.configure(&config(0.1)).unwrap();

        for id in 1..=3 {
            assert_eq!(bus.configure_count(ActId(id)), 1);
            assert_eq!(bus.config(ActId(id)), Some(config(0.1)));
        }
        assert_eq!(bus.command_log(ActId(2)).len(), 1);

        // A different configuration reaches every unit
        g.configure(&config(0.2)).unwrap();
        for id in 1..=3 {
            assert_eq!(bus.configure_count(ActId(id)), 2);
            assert_eq!(bus.config(ActId(id)).map(|c| c.gains.k_p), Some(0.2));
        }
    }

    #[test]
    fn test_configure_failure_retried() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        bus.inject_config_faults(ActId(3), 1);
        assert!(g.configure(&config(0.1)).is_err());

        // The other units got the configuration, and the followers still follow
        assert_eq!(bus.config(ActId(1)), Some(config(0.1)));
        assert_eq!(bus.config(ActId(3)), None);
        assert_eq!(bus.demand(ActId(3)), Some(ActDem::Follow(ActId(1))));

        g.configure(&config(0.1)).unwrap();
        assert_eq!(bus.config(ActId(3)), Some(config(0.1)));
    }

    #[test]
    fn test_at_target_bands() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        let cases = [
            (3000.0, 2851.0, true),
            (3000.0, 3149.0, true),
            (3000.0, 2849.0, false),
            (3000.0, 3151.0, false),
            (-2000.0, -1901.0, true),
            (-2000.0, -1899.0, false),
            (-2000.0, 2000.0, false),
        ];

        for (target, measured, expected) in cases.iter() {
            force_all_rpm(&bus, *measured);
            g.refresh();
            assert_eq!(
                g.is_at_target(*target, 0.05),
                *expected,
                "target {} measured {}",
                target,
                measured
            );
        }
    }

    #[test]
    fn test_at_target_floor() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        force_all_rpm(&bus, 40.0);
        g.refresh();
        assert!(g.is_at_target(0.0, 0.05));
        assert!(g.is_at_target(-30.0, 0.05));

        force_all_rpm(&bus, -60.0);
        g.refresh();
        assert!(!g.is_at_target(0.0, 0.05));
        assert!(!g.is_at_target(30.0, 0.05));

        g.set_at_target_floor_rpm(100.0);
        assert!(g.is_at_target(30.0, 0.05));
    }

    #[test]
    fn test_mean_spread() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        force_rpm(&bus, 1, 3000.0);
        force_rpm(&bus, 2, 2900.0);
        force_rpm(&bus, 3, 3100.0);
        g.refresh();

        assert!((g.mean_velocity_rpm() - 3000.0).abs() < 1e-9);
        assert!((g.velocity_spread_rpm() - 200.0).abs() < 1e-9);
        assert_eq!(g.unit_velocities_rpm().len(), 3);
        assert!(g.total_current_a() >= 0.0);
        assert_eq!(g.max_temperature_c(), 25.0);
    }

    #[test]
    fn test_read_fault_hold_then_lost() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        force_rpm(&bus, 1, 3000.0);
        force_rpm(&bus, 2, 3000.0);
        force_rpm(&bus, 3, 2700.0);
        g.refresh();
        assert!((g.mean_velocity_rpm() - 2900.0).abs() < 1e-9);

        // Follower read fails on the next two cycles while its speed moves on
        bus.inject_read_faults(ActId(3), 2);
        force_rpm(&bus, 3, 1000.0);

        // First failed cycle uses the previous value
        g.refresh();
        assert_eq!(
            g.unit_velocity_status(),
            vec![SignalStatus::Fresh, SignalStatus::Fresh, SignalStatus::Held]
        );
        assert!((g.mean_velocity_rpm() - 2900.0).abs() < 1e-9);
        assert!((g.velocity_spread_rpm() - 300.0).abs() < 1e-9);

        // Second failed cycle excludes the unit
        g.refresh();
        assert_eq!(g.unit_velocity_status()[2], SignalStatus::Lost);
        assert!((g.mean_velocity_rpm() - 3000.0).abs() < 1e-9);
        assert!(g.velocity_spread_rpm().abs() < 1e-9);

        // Recovered
        g.refresh();
        assert_eq!(g.unit_velocity_status()[2], SignalStatus::Fresh);
        assert!((g.mean_velocity_rpm() - 2333.333).abs() < 1e-2);
    }

    #[test]
    fn test_all_units_lost_keeps_mean() {
        let bus = SimBus::new(SimParams::default());
        let mut g = group(&bus);

        force_all_rpm(&bus, 1200.0);
        g.refresh();

        for id in 1..=3 {
            bus.inject_read_faults(ActId(id), 5);
        }
        g.refresh();
        g.refresh();
        g.refresh();

        assert!((g.mean_velocity_rpm() - 1200.0).abs() < 1e-9);
        assert_eq!(g.velocity_spread_rpm(), 0.0);
    }
}
