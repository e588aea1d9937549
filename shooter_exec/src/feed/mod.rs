//! # Feed actuator
//!
//! The open-loop actuator which pushes game pieces into the flywheels once they are up to speed.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{error, trace, warn};
use serde::Serialize;

// Internal
use crate::act_driver::{ActDriver, Signal};
use comms_if::eqpt::act::{ActConfig, ActDem, ActError, ActId};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub struct FeedActuator {
    driver: Box<dyn ActDriver>,

    state: FeedState,

    applied_config: Option<ActConfig>,

    velocity_rps: Signal,
    current_a: Signal,
    temperature_c: Signal,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum FeedState {
    Off,

    /// Duty cycle between -1.0 and +1.0
    DutyCycle(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FeedActuator {
    pub fn new(driver: Box<dyn ActDriver>) -> Self {
        Self {
            driver,
            state: FeedState::Off,
            applied_config: None,
            velocity_rps: Signal::default(),
            current_a: Signal::default(),
            temperature_c: Signal::default(),
        }
    }

    pub fn id(&self) -> ActId {
        self.driver.id()
    }

    /// Apply the configuration, unless it has already been applied.
    pub fn configure(&mut self, config: &ActConfig) -> Result<(), ActError> {
        if self.applied_config.as_ref() == Some(config) {
            return Ok(());
        }

        match self.driver.configure(config) {
            Ok(()) => {
                self.applied_config = Some(*config);
                Ok(())
            }
            Err(e) => {
                error!("Failed to configure feed actuator {}: {}", self.driver.id(), e);
                self.applied_config = None;
                Err(e)
            }
        }
    }

    /// Drive the feed at the given duty cycle, limited to [-1, 1].
    ///
    /// A non-finite duty cycle stops the feed.
    pub fn run(&mut self, duty_cycle: f64) {
        if !duty_cycle.is_finite() {
            warn!("Invalid feed duty cycle {}, stopping the feed", duty_cycle);
            self.stop();
            return;
        }

        let duty_cycle = clamp(&duty_cycle, &-1.0, &1.0);

        trace!("Feed demand: {}", duty_cycle);

        if let Err(e) = self.driver.command(ActDem::DutyCycle(duty_cycle)) {
            warn!("Feed command failed: {}", e);
        }

        self.state = FeedState::DutyCycle(duty_cycle);
    }

    pub fn stop(&mut self) {
        if let Err(e) = self.driver.command(ActDem::Neutral) {
            warn!("Feed stop command failed: {}", e);
        }

        self.state = FeedState::Off;
    }

    pub fn refresh(&mut self) {
        self.velocity_rps.update(self.driver.measured_velocity_rps());
        self.current_a.update(self.driver.measured_current_a());
        self.temperature_c.update(self.driver.measured_temperature_c());
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, FeedState::DutyCycle(_))
    }

    /// Commanded duty cycle, zero when off.
    pub fn duty_cycle(&self) -> f64 {
        match self.state {
            FeedState::Off => 0.0,
            FeedState::DutyCycle(d) => d,
        }
    }

    /// Units: rotor rpm
    pub fn velocity_rpm(&self) -> f64 {
        self.velocity_rps.value() * 60.0
    }

    pub fn current_a(&self) -> f64 {
        self.current_a.value()
    }

    pub fn temperature_c(&self) -> f64 {
        self.temperature_c.value()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::act_driver::sim::{SimBus, SimParams};

    #[test]
    fn test_run_clamped() {
        let bus = SimBus::new(SimParams::default());
        let mut feed = FeedActuator::new(Box::new(bus.driver(ActId(4))));

        feed.run(1.7);
        assert_eq!(feed.duty_cycle(), 1.0);
        assert_eq!(bus.demand(ActId(4)), Some(ActDem::DutyCycle(1.0)));

        feed.run(-0.5);
        assert_eq!(feed.state(), FeedState::DutyCycle(-0.5));

        feed.stop();
        assert_eq!(feed.duty_cycle(), 0.0);
        assert!(!feed.is_running());
        assert_eq!(bus.demand(ActId(4)), Some(ActDem::Neutral));
    }

    #[test]
    fn test_run_nan_stops() {
        let bus = SimBus::new(SimParams::default());
        let mut feed = FeedActuator::new(Box::new(bus.driver(ActId(4))));

        feed.run(0.25);
        feed.run(f64::NAN);

        assert_eq!(feed.state(), FeedState::Off);
        assert_eq!(feed.duty_cycle(), 0.0);
        assert_eq!(bus.demand(ActId(4)), Some(ActDem::Neutral));
    }

    #[test]
    fn test_refresh() {
        let bus = SimBus::new(SimParams::default());
        let mut feed = FeedActuator::new(Box::new(bus.driver(ActId(4))));

        bus.force_velocity(ActId(4), Some(10.0));
        feed.refresh();
        assert_eq!(feed.velocity_rpm(), 600.0);

        bus.inject_read_faults(ActId(4), 1);
        bus.force_velocity(ActId(4), Some(20.0));
        feed.refresh();
        assert_eq!(feed.velocity_rpm(), 600.0);
    }
}
