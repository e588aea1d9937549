//! # Telecommand processor module
//!
//! The telecommand processor handles various TCs coming from any source.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};

// Internal
use crate::data_store::{DataStore, SafeModeCause};
use comms_if::tc::Tc;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand.
///
/// Mutates the datastore to send commands to different modules. Shooter commands are rejected
/// while in safe mode.
pub fn exec(ds: &mut DataStore, tc: &Tc) {

    // Handle different Tcs
    match tc {
        Tc::MakeSafe => {
            debug!("Recieved MakeSafe command");
            ds.make_safe(SafeModeCause::MakeSafeTc);
        },
        Tc::MakeUnsafe => {
            debug!("Recieved MakeUnsafe command");
            if ds.make_unsafe(SafeModeCause::MakeSafeTc).is_err() {
                warn!(
                    "Cannot leave safe mode, it was not entered by a MakeSafe TC (cause: {:?})",
                    ds.safe_cause
                );
            }
        },
        Tc::Shooter(cmd) => {
            if ds.safe {
                warn!("In safe mode, rejected shooter command {:?}", cmd);
                return;
            }

            // A later command in the same cycle would end this one straight away anyway
            if let Some(prev) = ds.shooter_ctrl_input.cmd.replace(*cmd) {
                debug!("{} superseded by {} in the same cycle", prev.name(), cmd.name());
            }
        }
    }

}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data_store::test::{run_cycle, sim_data_store};
    use comms_if::tc::shooter::ShooterCmd;

    #[test]
    fn test_safe_mode_rejects_shooter_tcs() {
        let (_bus, mut ds) = sim_data_store();

        ds.cycle_start(50.0, 0.0);
        exec(&mut ds, &Tc::MakeSafe);
        exec(&mut ds, &Tc::Shooter(ShooterCmd::Run));
        assert_eq!(ds.shooter_ctrl_input.cmd, None);
        run_cycle(&mut ds);
        assert_eq!(ds.shooter_tm.active_cmd, None);

        ds.cycle_start(50.0, 0.02);
        exec(&mut ds, &Tc::MakeUnsafe);
        exec(&mut ds, &Tc::Shooter(ShooterCmd::Run));
        run_cycle(&mut ds);
        assert!(!ds.safe);
        assert_eq!(ds.shooter_tm.active_cmd, Some("Run"));
    }

    #[test]
    fn test_last_cmd_in_cycle_wins() {
        let (_bus, mut ds) = sim_data_store();

        ds.cycle_start(50.0, 0.0);
        exec(&mut ds, &Tc::Shooter(ShooterCmd::FeedOnly));
        exec(&mut ds, &Tc::Shooter(ShooterCmd::Eject { duration_s: 1.0 }));
        run_cycle(&mut ds);

        assert_eq!(ds.shooter_tm.active_cmd, Some("Eject"));
        assert!(!ds.shooter_tm.feed_running);
    }
}
