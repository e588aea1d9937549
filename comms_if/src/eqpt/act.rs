//! # Actuator Equipment Commands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::fmt;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bus identifier of a single actuator (motor controller).
#[derive(Serialize, Deserialize, Debug, Hash, Eq, PartialEq, Copy, Clone, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ActId(pub u8);

/// Closed-loop velocity gains held in the actuator's velocity slot.
///
/// Units are those of the motor controller, i.e. volts per rev/s error for `k_p`, volts per rev/s
/// demand for `k_v`, and volts for `k_s`.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct Gains {
    /// Proportional gain
    pub k_p: f64,

    /// Velocity feedforward gain
    pub k_v: f64,

    /// Static friction feedforward
    pub k_s: f64,
}

/// Current limits applied by the actuator.
///
/// A limit of `None` means that limit is disabled.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct CurrentLimits {
    /// Supply side current limit.
    ///
    /// Units: amps
    pub supply_a: Option<f64>,

    /// Stator current limit.
    ///
    /// Units: amps
    pub stator_a: Option<f64>,
}

/// Full configuration applied to an actuator.
#[derive(Serialize, Deserialize, Debug, Default, Copy, Clone, PartialEq)]
pub struct ActConfig {
    pub gains: Gains,

    pub current_limits: CurrentLimits,

    /// Behaviour of the actuator when commanded to neutral or disabled.
    pub neutral_mode: NeutralMode,

    /// If true positive demands turn the rotor clockwise.
    pub inverted: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Demand issued to an actuator.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub enum ActDem {
    /// Closed-loop velocity demand.
    ///
    /// Units: rotor revolutions/second
    Velocity(f64),

    /// Open-loop duty cycle demand, between -1.0 and +1.0.
    DutyCycle(f64),

    /// Neutral output, the actuator coasts or brakes depending on its `NeutralMode`.
    Neutral,

    /// Mirror the output of the given leader actuator.
    Follow(ActId),
}

/// Behaviour of an actuator when its output is neutral.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NeutralMode {
    Coast,
    Brake,
}

/// Errors raised by an actuator driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActError {
    #[error("Actuator {0} did not respond")]
    Timeout(ActId),

    #[error("Transport error talking to actuator {0}: {1}")]
    Transport(ActId, String),

    #[error("Actuator {0} rejected the demand {1:?}")]
    DemandRejected(ActId, ActDem),

    #[error("Actuator {0} has no fresh signal data")]
    StaleSignal(ActId),
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Default for NeutralMode {
    fn default() -> Self {
        NeutralMode::Coast
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
