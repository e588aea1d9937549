//! # Simulated actuators
//!
//! A [`SimBus`] holds a set of simulated motors sharing one bus, each of which can be accessed
//! through a [`SimDriver`] handle. The bus is stepped once per cycle by the owner of the
//! simulation, and exposes hooks used by tests to force measurements and inject faults.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    cell::RefCell,
    collections::{BTreeMap, VecDeque},
    rc::Rc,
};

use log::trace;
use serde::{Deserialize, Serialize};

use comms_if::eqpt::act::{ActConfig, ActDem, ActError, ActId, NeutralMode};
use util::maths::lin_map;

use super::ActDriver;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of demands kept in each motor's command log, older ones are dropped.
pub const COMMAND_LOG_LEN: usize = 256;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Physical constants of the simulated motors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimParams {
    /// Time constant of the velocity response while driven.
    ///
    /// Units: seconds
    pub time_constant_s: f64,

    /// Time constant of the velocity decay in coast. Brake uses `time_constant_s`.
    ///
    /// Units: seconds
    pub coast_time_constant_s: f64,

    /// Velocity reached at full duty cycle.
    ///
    /// Units: rotor revolutions/second
    pub free_speed_rps: f64,

    /// Current drawn with no velocity error.
    ///
    /// Units: amps
    pub idle_current_a: f64,

    /// Current drawn per rev/s of velocity error.
    ///
    /// Units: amps/(rev/s)
    pub current_per_rps_error_a: f64,

    /// Units: degrees celsius
    pub ambient_temperature_c: f64,

    /// Steady state temperature rise per amp drawn.
    ///
    /// Units: degrees celsius/amp
    pub temperature_rise_per_a_c: f64,

    /// Units: seconds
    pub thermal_time_constant_s: f64,
}

/// A bus of simulated motors.
///
/// Cloning the bus gives another handle onto the same motors.
#[derive(Debug, Clone)]
pub struct SimBus {
    inner: Rc<RefCell<BusInner>>,
}

/// [`ActDriver`] for one motor on a [`SimBus`].
#[derive(Debug)]
pub struct SimDriver {
    id: ActId,
    bus: SimBus,
}

#[derive(Debug)]
struct BusInner {
    params: SimParams,
    motors: BTreeMap<ActId, SimMotor>,
}

#[derive(Debug, Clone)]
struct SimMotor {
    demand: ActDem,

    velocity_rps: f64,
    current_a: f64,
    temperature_c: f64,

    config: Option<ActConfig>,
    num_configures: usize,
    command_log: VecDeque<ActDem>,

    /// If set velocity reads return this value instead of the simulated one
    forced_velocity_rps: Option<f64>,

    /// Number of upcoming velocity reads which will fail
    pending_read_faults: usize,

    /// Number of upcoming configure calls which will fail
    pending_config_faults: usize,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            time_constant_s: 0.4,
            coast_time_constant_s: 2.0,
            free_speed_rps: 100.0,
            idle_current_a: 1.5,
            current_per_rps_error_a: 0.8,
            ambient_temperature_c: 25.0,
            temperature_rise_per_a_c: 0.5,
            thermal_time_constant_s: 60.0,
        }
    }
}

impl SimMotor {
    fn new(ambient_temperature_c: f64) -> Self {
        Self {
            demand: ActDem::Neutral,
            velocity_rps: 0.0,
            current_a: 0.0,
            temperature_c: ambient_temperature_c,
            config: None,
            num_configures: 0,
            command_log: VecDeque::with_capacity(COMMAND_LOG_LEN),
            forced_velocity_rps: None,
            pending_read_faults: 0,
            pending_config_faults: 0,
        }
    }
}

impl SimBus {
    pub fn new(params: SimParams) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BusInner {
                params,
                motors: BTreeMap::new(),
            })),
        }
    }

    /// Get a driver for the motor with the given id, adding the motor to the bus if needed.
    pub fn driver(&self, id: ActId) -> SimDriver {
        let mut inner = self.inner.borrow_mut();
        let ambient = inner.params.ambient_temperature_c;
        inner
            .motors
            .entry(id)
            .or_insert_with(|| SimMotor::new(ambient));

        SimDriver {
            id,
            bus: self.clone(),
        }
    }

    /// Advance the simulation by `dt_s` seconds.
    pub fn step(&self, dt_s: f64) {
        let mut inner = self.inner.borrow_mut();
        let params = inner.params;

        // Resolve what each motor is trying to do before moving any of them, so followers track
        // their leader's demand for this step.
        let targets: BTreeMap<ActId, (f64, f64)> = inner
            .motors
            .iter()
            .map(|(id, m)| (*id, resolve_target(&params, &inner.motors, m)))
            .collect();

        for (id, motor) in inner.motors.iter_mut() {
            let (target_rps, tau_s) = match targets.get(id) {
                Some(t) => *t,
                None => continue,
            };

            let error_rps = target_rps - motor.velocity_rps;
            motor.velocity_rps += error_rps * (1.0 - (-dt_s / tau_s).exp());

            let mut current_a = match motor.demand {
                ActDem::Neutral => 0.0,
                _ => params.idle_current_a + params.current_per_rps_error_a * error_rps.abs(),
            };
            if let Some(limit) = motor.config.and_then(|c| c.current_limits.stator_a) {
                current_a = current_a.min(limit);
            }
            motor.current_a = current_a;

            let steady_temp_c =
                params.ambient_temperature_c + params.temperature_rise_per_a_c * current_a;
            motor.temperature_c += (steady_temp_c - motor.temperature_c)
                * (1.0 - (-dt_s / params.thermal_time_constant_s).exp());
        }

        trace!("SimBus stepped by {} s", dt_s);
    }

    // ---- TEST HOOKS ----

    /// Force the velocity read from the motor, or return to the simulated value with `None`.
    pub fn force_velocity(&self, id: ActId, velocity_rps: Option<f64>) {
        self.with_motor(id, |m| m.forced_velocity_rps = velocity_rps);
    }

    /// Make the next `n` velocity reads from the motor fail.
    pub fn inject_read_faults(&self, id: ActId, n: usize) {
        self.with_motor(id, |m| m.pending_read_faults = n);
    }

    /// Make the next `n` configure calls on the motor fail.
    pub fn inject_config_faults(&self, id: ActId, n: usize) {
        self.with_motor(id, |m| m.pending_config_faults = n);
    }

    /// Last demand issued to the motor.
    pub fn demand(&self, id: ActId) -> Option<ActDem> {
        self.with_motor(id, |m| m.demand)
    }

    /// The last [`COMMAND_LOG_LEN`] demands issued to the motor since the log was cleared, oldest
    /// first.
    pub fn command_log(&self, id: ActId) -> Vec<ActDem> {
        self.with_motor(id, |m| m.command_log.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear_command_logs(&self) {
        for m in self.inner.borrow_mut().motors.values_mut() {
            m.command_log.clear();
        }
    }

    /// Configuration last successfully applied to the motor.
    pub fn config(&self, id: ActId) -> Option<ActConfig> {
        self.with_motor(id, |m| m.config).flatten()
    }

    /// Number of successful configure calls on the motor.
    pub fn configure_count(&self, id: ActId) -> usize {
        self.with_motor(id, |m| m.num_configures).unwrap_or(0)
    }

    /// Simulated (not forced) velocity of the motor.
    pub fn velocity_rps(&self, id: ActId) -> Option<f64> {
        self.with_motor(id, |m| m.velocity_rps)
    }

    fn with_motor<T, F>(&self, id: ActId, f: F) -> Option<T>
    where
        F: FnOnce(&mut SimMotor) -> T,
    {
        self.inner.borrow_mut().motors.get_mut(&id).map(f)
    }
}

impl ActDriver for SimDriver {
    fn id(&self) -> ActId {
        self.id
    }

    fn configure(&mut self, config: &ActConfig) -> Result<(), ActError> {
        let id = self.id;
        self.bus
            .with_motor(id, |m| {
                if m.pending_config_faults > 0 {
                    m.pending_config_faults -= 1;
                    return Err(ActError::Transport(id, String::from("configure not acknowledged")));
                }

                m.config = Some(*config);
                m.num_configures += 1;
                Ok(())
            })
            .unwrap_or(Err(ActError::Timeout(id)))
    }

    fn command(&mut self, dem: ActDem) -> Result<(), ActError> {
        let id = self.id;

        let valid = match dem {
            ActDem::Velocity(v) => v.is_finite(),
            ActDem::DutyCycle(d) => d.is_finite() && d.abs() <= 1.0,
            ActDem::Neutral => true,
            ActDem::Follow(leader) => leader != id,
        };
        if !valid {
            return Err(ActError::DemandRejected(id, dem));
        }

        self.bus
            .with_motor(id, |m| {
                m.demand = dem;
                if m.command_log.len() == COMMAND_LOG_LEN {
                    m.command_log.pop_front();
                }
                m.command_log.push_back(dem);
            })
            .ok_or(ActError::Timeout(id))
    }

    fn measured_velocity_rps(&mut self) -> Result<f64, ActError> {
        let id = self.id;
        self.bus
            .with_motor(id, |m| {
                if m.pending_read_faults > 0 {
                    m.pending_read_faults -= 1;
                    return Err(ActError::StaleSignal(id));
                }

                Ok(m.forced_velocity_rps.unwrap_or(m.velocity_rps))
            })
            .unwrap_or(Err(ActError::Timeout(id)))
    }

    fn measured_current_a(&mut self) -> Result<f64, ActError> {
        self.bus
            .with_motor(self.id, |m| m.current_a)
            .ok_or(ActError::Timeout(self.id))
    }

    fn measured_temperature_c(&mut self) -> Result<f64, ActError> {
        self.bus
            .with_motor(self.id, |m| m.temperature_c)
            .ok_or(ActError::Timeout(self.id))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Get the velocity a motor is being driven towards and the time constant it approaches it with.
fn resolve_target(
    params: &SimParams,
    motors: &BTreeMap<ActId, SimMotor>,
    motor: &SimMotor,
) -> (f64, f64) {
    let coast_tau_s = match motor.config.map(|c| c.neutral_mode) {
        Some(NeutralMode::Brake) => params.time_constant_s,
        _ => params.coast_time_constant_s,
    };

    let demand = match motor.demand {
        // Followers mirror the leader's own demand, a follow chain is not resolved
        ActDem::Follow(leader) => match motors.get(&leader).map(|l| l.demand) {
            Some(ActDem::Follow(_)) | None => ActDem::Neutral,
            Some(d) => d,
        },
        d => d,
    };

    match demand {
        ActDem::Velocity(v) => (v, params.time_constant_s),
        ActDem::DutyCycle(d) => (
            lin_map((-1.0, 1.0), (-params.free_speed_rps, params.free_speed_rps), d),
            params.time_constant_s,
        ),
        _ => (0.0, coast_tau_s),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_follow_and_response() {
        let bus = SimBus::new(SimParams::default());
        let mut leader = bus.driver(ActId(1));
        let mut follower = bus.driver(ActId(2));

        follower.command(ActDem::Follow(ActId(1))).unwrap();
        leader.command(ActDem::Velocity(50.0)).unwrap();

        for _ in 0..500 {
            bus.step(0.02);
        }

        let l = leader.measured_velocity_rps().unwrap();
        let f = follower.measured_velocity_rps().unwrap();
        assert!((l - 50.0).abs() < 1e-3);
        assert!((f - 50.0).abs() < 1e-3);
        assert!(leader.measured_current_a().unwrap() > 0.0);
    }

    #[test]
    fn test_duty_cycle() {
        let bus = SimBus::new(SimParams::default());
        let mut feed = bus.driver(ActId(4));

        assert!(matches!(
            feed.command(ActDem::DutyCycle(1.5)),
            Err(ActError::DemandRejected(..))
        ));

        feed.command(ActDem::DutyCycle(0.5)).unwrap();
        for _ in 0..500 {
            bus.step(0.02);
        }
        assert!((feed.measured_velocity_rps().unwrap() - 50.0).abs() < 1e-3);
        assert_eq!(bus.command_log(ActId(4)), vec![ActDem::DutyCycle(0.5)]);
    }

    #[test]
    fn test_command_log_bounded() {
        let bus = SimBus::new(SimParams::default());
        let mut drv = bus.driver(ActId(1));

        for i in 0..(COMMAND_LOG_LEN + 50) {
            drv.command(ActDem::Velocity(i as f64)).unwrap();
        }

        let log = bus.command_log(ActId(1));
        assert_eq!(log.len(), COMMAND_LOG_LEN);
        assert_eq!(log[0], ActDem::Velocity(50.0));
        assert_eq!(
            log.last(),
            Some(&ActDem::Velocity((COMMAND_LOG_LEN + 49) as f64))
        );
    }

    #[test]
    fn test_hooks() {
        let bus = SimBus::new(SimParams::default());
        let id = ActId(3);
        let mut drv = bus.driver(id);

        bus.force_velocity(id, Some(12.5));
        bus.inject_read_faults(id, 2);

        assert!(drv.measured_velocity_rps().is_err());
        assert!(drv.measured_velocity_rps().is_err());
        assert_eq!(drv.measured_velocity_rps().unwrap(), 12.5);

        bus.inject_config_faults(id, 1);
        let config = ActConfig::default();
        assert!(drv.configure(&config).is_err());
        assert_eq!(bus.config(id), None);
        drv.configure(&config).unwrap();
        assert_eq!(bus.config(id), Some(config));
        assert_eq!(bus.configure_count(id), 1);
    }
}
