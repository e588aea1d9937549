//! # Data Store

use log::{info, warn};

use crate::shooter_ctrl::{self, ShooterCtrl, ShooterTm};

// ---------------------------------------------------------------------------
// ENUMS
// ---------------------------------------------------------------------------

/// Gives the reason the shooter has been put into safe mode
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SafeModeCause {
    MakeSafeTc,
    CycleOverruns,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Global data store for the executable.
pub struct DataStore {
    // Cycle management
    /// Number of cycles already executed
    pub num_cycles: u128,

    /// True if this cycle falls on a 1Hz boundary
    pub is_1_hz_cycle: bool,

    /// Time since the start of the session
    pub time_s: f64,

    // Safe mode variables
    /// Determines if the shooter is in safe mode.
    pub safe: bool,

    /// Gives the reason for the shooter being in safe mode.
    pub safe_cause: Option<SafeModeCause>,

    // ShooterCtrl
    pub shooter_ctrl: ShooterCtrl,
    pub shooter_ctrl_input: shooter_ctrl::InputData,
    pub shooter_tm: ShooterTm,
    pub shooter_ctrl_status_rpt: shooter_ctrl::StatusReport,

    // Monitoring Counters
    /// Number of consecutive cycle overruns
    pub num_consec_cycle_overruns: u64,
}

// ---------------------------------------------------------------------------
// IMPLS
// ---------------------------------------------------------------------------

impl DataStore {
    pub fn new(shooter_ctrl: ShooterCtrl) -> Self {
        Self {
            num_cycles: 0,
            is_1_hz_cycle: false,
            time_s: 0.0,
            safe: false,
            safe_cause: None,
            shooter_ctrl,
            shooter_ctrl_input: shooter_ctrl::InputData::default(),
            shooter_tm: ShooterTm::default(),
            shooter_ctrl_status_rpt: shooter_ctrl::StatusReport::default(),
            num_consec_cycle_overruns: 0,
        }
    }

    /// Puts the shooter into safe mode with the given cause.
    pub fn make_safe(&mut self, cause: SafeModeCause) {
        if !self.safe {
            warn!("Make safe requested, cause: {:?}", cause);
            self.safe = true;
            self.safe_cause = Some(cause);

            // Drop any command for this cycle and stop everything
            self.shooter_ctrl_input.cmd = None;
            self.shooter_ctrl.cancel();
        }
    }

    /// Attempts to disable the safe mode by clearing the given cause.
    ///
    /// Returns `Ok(())` if this cause was cleared and safe mode was disabled, or `Err(())`
    /// otherwise. To remove safe mode the provided cause must match the initial reason for safe
    /// mode being enabled.
    ///
    /// If safe mode was not enabled `Ok(())` is returned
    pub fn make_unsafe(&mut self, cause: SafeModeCause) -> Result<(), ()> {
        if !self.safe {
            return Ok(());
        }

        match self.safe_cause {
            Some(root_cause) => {
                if cause == root_cause {
                    self.safe = false;
                    self.safe_cause = None;
                    info!("Make unsafe requested, root cause match, safe mode disabled");
                    Ok(())
                } else {
                    Err(())
                }
            }
            None => Ok(()),
        }
    }

    /// Perform actions required at the start of a cycle.
    ///
    /// Clears those items that need clearing at the start of a cycle, and sets the 1Hz cycle flag.
    pub fn cycle_start(&mut self, cycle_frequency_hz: f64, time_s: f64) {
        let cycles_per_s = (cycle_frequency_hz.round() as u128).max(1);
        self.is_1_hz_cycle = self.num_cycles % cycles_per_s == 0;

        self.time_s = time_s;

        self.shooter_ctrl_input = shooter_ctrl::InputData { time_s, cmd: None };
        self.shooter_ctrl_status_rpt = shooter_ctrl::StatusReport::default();
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        act_driver::sim::{SimBus, SimParams},
        shooter_ctrl::{Params, ShooterHw},
        tunable::MemTunableStore,
    };
    use comms_if::{
        eqpt::act::{ActDem, ActId},
        tc::shooter::ShooterCmd,
    };
    use util::module::State;

    /// A data store around a simulated shooter.
    pub(crate) fn sim_data_store() -> (SimBus, DataStore) {
        let bus = SimBus::new(SimParams::default());
        let params = Params::default();

        let mut ctrl = ShooterCtrl::new(
            ShooterHw::from_sim_bus(&bus, &params),
            Box::new(MemTunableStore::new()),
        );
        ctrl.init(params).unwrap();

        (bus, DataStore::new(ctrl))
    }

    pub(crate) fn run_cycle(ds: &mut DataStore) {
        match ds.shooter_ctrl.proc(&ds.shooter_ctrl_input) {
            Ok((tm, rpt)) => {
                ds.shooter_tm = tm;
                ds.shooter_ctrl_status_rpt = rpt;
            }
            Err(e) => match e {},
        }
        ds.num_cycles += 1;
    }

    #[test]
    fn test_make_safe_stops_shooter() {
        let (bus, mut ds) = sim_data_store();

        ds.cycle_start(50.0, 0.0);
        ds.shooter_ctrl_input.cmd = Some(ShooterCmd::RunAtRpm { rpm: 3000.0 });
        run_cycle(&mut ds);
        assert!(ds.shooter_tm.running);

        ds.cycle_start(50.0, 0.02);
        ds.shooter_ctrl_input.cmd = Some(ShooterCmd::FeedOnly);
        ds.make_safe(SafeModeCause::MakeSafeTc);
        run_cycle(&mut ds);

        assert!(ds.safe);
        assert!(!ds.shooter_tm.running);
        assert_eq!(ds.shooter_tm.active_cmd, None);
        assert_eq!(bus.demand(ActId(1)), Some(ActDem::Neutral));
        assert_eq!(bus.demand(ActId(4)), Some(ActDem::Neutral));
    }

    #[test]
    fn test_make_unsafe_cause() {
        let (_bus, mut ds) = sim_data_store();

        assert_eq!(ds.make_unsafe(SafeModeCause::MakeSafeTc), Ok(()));

        ds.make_safe(SafeModeCause::CycleOverruns);
        assert_eq!(ds.make_unsafe(SafeModeCause::MakeSafeTc), Err(()));
        assert!(ds.safe);

        assert_eq!(ds.make_unsafe(SafeModeCause::CycleOverruns), Ok(()));
        assert!(!ds.safe);
    }

    #[test]
    fn test_1_hz_flag() {
        let (_bus, mut ds) = sim_data_store();

        let mut num_1_hz = 0;
        for k in 0..150 {
            ds.cycle_start(50.0, k as f64 / 50.0);
            if ds.is_1_hz_cycle {
                num_1_hz += 1;
            }
            run_cycle(&mut ds);
        }

        assert_eq!(num_1_hz, 3);
    }
}
