//! Composed operations run by ShooterCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::shooter::ShooterCmd;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What the shooter does each cycle while a command is active.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Routine {
    /// Flywheels at the live target
    Run,

    /// Flywheels at the live target, feed released by the spin-up gate
    Gated,

    /// Feed at the live feed output, flywheels untouched
    FeedOnly,

    /// Flywheels (and optionally the feed) reversed until `end_time_s`
    Eject { end_time_s: f64, with_feed: bool },
}

/// A request made to ShooterCtrl, handled at the start of the next cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Request {
    Cmd(ShooterCmd),

    /// End whatever is running and stop everything
    Cancel,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Routine {
    /// Returns the routine which executes the given command, or `None` if the command only stops
    /// the shooter.
    ///
    /// Any override carried by the command must be applied by the caller.
    pub(crate) fn for_cmd(cmd: &ShooterCmd, time_s: f64) -> Option<Self> {
        match *cmd {
            ShooterCmd::Run | ShooterCmd::RunAtRpm { .. } => Some(Routine::Run),
            ShooterCmd::RunWithFeed | ShooterCmd::RunAtRpmWithFeed { .. } => Some(Routine::Gated),
            ShooterCmd::FeedOnly => Some(Routine::FeedOnly),
            ShooterCmd::Stop => None,
            ShooterCmd::Eject { duration_s } => Some(Routine::Eject {
                end_time_s: time_s + duration_s,
                with_feed: false,
            }),
            ShooterCmd::EjectWithFeed { duration_s } => Some(Routine::Eject {
                end_time_s: time_s + duration_s,
                with_feed: true,
            }),
        }
    }
}
