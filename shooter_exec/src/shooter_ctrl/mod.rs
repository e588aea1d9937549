//! Shooter control module
//!
//! Owns the flywheel [`ActuatorGroup`](crate::act_group::ActuatorGroup), the
//! [`FeedActuator`](crate::feed::FeedActuator) and the
//! [`SpinUpGate`](crate::spin_up_gate::SpinUpGate), and composes them into the operations
//! carried by [`ShooterCmd`](comms_if::tc::shooter::ShooterCmd).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod routine;
mod state;
mod tm;
mod tunables;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;
pub use tm::*;
pub use tunables::*;

use comms_if::eqpt::act::ActId;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors found in the shooter parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("The gear ratio must be positive, found {0}")]
    InvalidGearRatio(f64),

    #[error("Actuator {0} is used more than once")]
    DuplicateActId(ActId),

    #[error("{0} must be between -1.0 and 1.0, found {1}")]
    InvalidDutyCycle(&'static str, f64),

    #[error("{0} must be finite and not negative, found {1}")]
    InvalidValue(&'static str, f64),

    #[error("The parameters expect actuator {expected} as the {role} but the hardware provides {found}")]
    HardwareMismatch {
        role: &'static str,
        expected: ActId,
        found: ActId,
    },

    #[error("The parameters expect {expected} followers but the hardware provides {found}")]
    FollowerCountMismatch { expected: usize, found: usize },
}
