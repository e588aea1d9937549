//! # Actuator Driver Module
//!
//! This module provides a unified interface over the motor controllers driving the shooter, and
//! the signal caching used to ride through transient read faults.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Simulated [`ActDriver`] implementation.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::act::{ActConfig, ActDem, ActError, ActId};
use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing motor controllers.
pub trait ActDriver {
    /// Bus identifier of the controller.
    fn id(&self) -> ActId;

    /// Apply a full configuration to the controller.
    ///
    /// Applying the same configuration twice must leave the controller unchanged.
    fn configure(&mut self, config: &ActConfig) -> Result<(), ActError>;

    /// Issue a demand to the controller.
    fn command(&mut self, dem: ActDem) -> Result<(), ActError>;

    /// Measured rotor velocity.
    ///
    /// Units: rotor revolutions/second
    fn measured_velocity_rps(&mut self) -> Result<f64, ActError>;

    /// Measured stator current.
    ///
    /// Units: amps
    fn measured_current_a(&mut self) -> Result<f64, ActError>;

    /// Measured controller temperature.
    ///
    /// Units: degrees celsius
    fn measured_temperature_c(&mut self) -> Result<f64, ActError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A measured signal which holds its last good value through a single failed read.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Signal {
    /// Last good value of the signal
    value: f64,

    status: SignalStatus,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Freshness of a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalStatus {
    /// Read successfully this cycle
    Fresh,

    /// Read failed this cycle, the value from the previous cycle is used
    Held,

    /// Never read, or read failed on more than one consecutive cycle
    Lost,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for SignalStatus {
    fn default() -> Self {
        SignalStatus::Lost
    }
}

impl Signal {
    /// Update the signal with the result of this cycle's read, returning the new status.
    pub fn update(&mut self, read: Result<f64, ActError>) -> SignalStatus {
        self.status = match read {
            Ok(v) => {
                self.value = v;
                SignalStatus::Fresh
            }
            Err(_) => match self.status {
                SignalStatus::Fresh => SignalStatus::Held,
                _ => SignalStatus::Lost,
            },
        };

        self.status
    }

    /// Last good value, regardless of status.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn status(&self) -> SignalStatus {
        self.status
    }

    /// Returns the value if it is fresh or held.
    pub fn usable(&self) -> Option<f64> {
        match self.status {
            SignalStatus::Fresh | SignalStatus::Held => Some(self.value),
            SignalStatus::Lost => None,
        }
    }
}
