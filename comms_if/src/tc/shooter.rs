//! # Shooter telecommands

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An operation that can be performed by the shooter.
///
/// Every operation other than `Stop` and the ejects runs until it is cancelled or replaced by
/// another command. Whatever way an operation ends, the flywheels and the feed are left stopped.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, StructOpt)]
pub enum ShooterCmd {
    /// Spin the flywheels at the tunable target RPM.
    #[structopt(name = "run")]
    Run,

    /// Spin the flywheels at the given RPM.
    ///
    /// The RPM is written back into the tunable target so that it is visible in telemetry and
    /// remains tunable while running.
    #[structopt(name = "run-at")]
    RunAtRpm {
        /// Flywheel target in revolutions/minute.
        rpm: f64,
    },

    /// Spin the flywheels at the tunable target RPM, then run the feed once the flywheels reach
    /// the target or the spin-up timeout expires.
    #[structopt(name = "shoot")]
    RunWithFeed,

    /// As `RunWithFeed` but at the given RPM, which is written back into the tunable target.
    #[structopt(name = "shoot-at")]
    RunAtRpmWithFeed {
        /// Flywheel target in revolutions/minute.
        rpm: f64,
    },

    /// Run only the feed at the tunable duty cycle.
    #[structopt(name = "feed")]
    FeedOnly,

    /// Stop the flywheels and the feed.
    #[structopt(name = "stop")]
    Stop,

    /// Reverse the flywheels for the given duration to clear a jam.
    #[structopt(name = "eject")]
    Eject {
        /// Duration of the eject in seconds.
        duration_s: f64,
    },

    /// Reverse the flywheels and the feed for the given duration to clear a jam.
    #[structopt(name = "eject-all")]
    EjectWithFeed {
        /// Duration of the eject in seconds.
        duration_s: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ShooterCmd {
    /// Human readable name of the command, used in logs and telemetry.
    pub fn name(&self) -> &'static str {
        match self {
            ShooterCmd::Run => "Run",
            ShooterCmd::RunAtRpm { .. } => "RunAtRpm",
            ShooterCmd::RunWithFeed => "RunWithFeed",
            ShooterCmd::RunAtRpmWithFeed { .. } => "RunAtRpmWithFeed",
            ShooterCmd::FeedOnly => "FeedOnly",
            ShooterCmd::Stop => "Stop",
            ShooterCmd::Eject { .. } => "Eject",
            ShooterCmd::EjectWithFeed { .. } => "EjectWithFeed",
        }
    }

    /// Determine if the command is valid (finite values, positive durations).
    pub fn is_valid(&self) -> bool {
        match self {
            ShooterCmd::RunAtRpm { rpm } | ShooterCmd::RunAtRpmWithFeed { rpm } => rpm.is_finite(),
            ShooterCmd::Eject { duration_s } | ShooterCmd::EjectWithFeed { duration_s } => {
                duration_s.is_finite() && *duration_s > 0.0
            }
            _ => true,
        }
    }
}
