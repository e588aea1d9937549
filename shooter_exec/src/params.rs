//! # Shooter Executable Parameters
//!
//! This module provide parameters for the shooter executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::act_driver::sim::SimParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShooterExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Number of consecutive cycle overruns after which safe mode is engaged
    pub max_consec_cycle_overruns: u64,

    /// Path to the live tunables file, relative to the params directory
    pub tunables_file: String,

    /// Sequence run when no script is given
    pub default_sequence: DefaultSequence,

    /// Simulated actuator constants
    #[serde(default)]
    pub sim: SimParams,
}

/// Spin up to a target, feed, then stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSequence {
    /// Units: flywheel rpm
    pub target_rpm: f64,

    /// Time from starting the sequence to stopping the shooter.
    ///
    /// Units: seconds
    pub duration_s: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExecParamsError {
    #[error("The cycle period must be finite and positive, found {0} s")]
    InvalidCyclePeriod(f64),

    #[error("Invalid default sequence {0}: {1}")]
    InvalidDefaultSequence(&'static str, f64),

    #[error("Simulation time constant {0} must be finite and positive, found {1} s")]
    InvalidSimTimeConstant(&'static str, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShooterExecParams {
    /// Check the parameters are usable.
    pub fn are_valid(&self) -> Result<(), ExecParamsError> {
        if !(self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0) {
            return Err(ExecParamsError::InvalidCyclePeriod(self.cycle_period_s));
        }

        let seq = &self.default_sequence;
        if !seq.target_rpm.is_finite() {
            return Err(ExecParamsError::InvalidDefaultSequence("target_rpm", seq.target_rpm));
        }
        if !(seq.duration_s.is_finite() && seq.duration_s >= 0.0) {
            return Err(ExecParamsError::InvalidDefaultSequence("duration_s", seq.duration_s));
        }

        let time_constants = [
            ("time_constant_s", self.sim.time_constant_s),
            ("coast_time_constant_s", self.sim.coast_time_constant_s),
            ("thermal_time_constant_s", self.sim.thermal_time_constant_s),
        ];
        for (name, tau_s) in time_constants.iter() {
            if !(tau_s.is_finite() && *tau_s > 0.0) {
                return Err(ExecParamsError::InvalidSimTimeConstant(*name, *tau_s));
            }
        }

        Ok(())
    }
}
