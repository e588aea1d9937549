//! # Shooter library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to access items defined
//! inside the shooter crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator drivers - unified access to the motor controllers, plus a simulated bus
pub mod act_driver;

/// Actuator group - a leader motor and its followers driving one mechanism
pub mod act_group;

/// Global data store for the executable
pub mod data_store;

/// Feed actuator - the open-loop stage which pushes game pieces into the flywheels
pub mod feed;

/// Parameters of the executable
pub mod params;

/// Shooter control module - composes the flywheels, feed and spin-up gate into commands
pub mod shooter_ctrl;

/// Spin-up gate - races "at target" against a timeout before releasing the feed
pub mod spin_up_gate;

/// Telecommand processor - routes telecommands into the data store
pub mod tc_processor;

/// Tunable parameters - live control constants with change detection
pub mod tunable;
