//! Implementations for the ShooterCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::convert::Infallible;

// Internal
use super::{
    routine::{Request, Routine},
    Params, ParamsError, SequenceState, ShooterTm, ShooterTmRecord, ShooterTunables,
};
use crate::{
    act_driver::{sim::SimBus, ActDriver},
    act_group::{ActuatorGroup, GroupState},
    feed::FeedActuator,
    spin_up_gate::{GateState, SpinUp, SpinUpGate, SpinUpOutcome},
    tunable::TunableStore,
};
use comms_if::{
    eqpt::act::{ActError, ActId},
    tc::shooter::ShooterCmd,
};
use util::{
    archive::{ArchiveError, Archived, Archiver},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The actuators owned by the shooter.
pub struct ShooterHw {
    pub leader: Box<dyn ActDriver>,
    pub followers: Vec<Box<dyn ActDriver>>,
    pub feed: Box<dyn ActDriver>,
}

/// Shooter control module state
pub struct ShooterCtrl {
    params: Params,

    store: Box<dyn TunableStore>,
    tunables: ShooterTunables,

    group: ActuatorGroup,
    feed: FeedActuator,
    gate: SpinUpGate,

    /// Requests to handle on the next cycle
    pending: VecDeque<Request>,

    /// The command being executed and the routine executing it
    active: Option<(ShooterCmd, Routine)>,

    desync: bool,

    /// Time of the current cycle
    ///
    /// Units: seconds
    time_s: f64,

    report: StatusReport,

    tm: ShooterTm,
    arch_tm: Archiver,
}

/// Input data to shooter control.
#[derive(Debug, Default, Clone)]
pub struct InputData {
    /// Time of this cycle
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Command to execute, or `None` if there is no new command this cycle.
    pub cmd: Option<ShooterCmd>,
}

/// Status report for shooter control processing.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct StatusReport {
    /// The flywheel gains were reapplied this cycle
    pub gains_applied: bool,

    /// A command started this cycle
    pub cmd_started: bool,

    /// A command ended this cycle
    pub cmd_ended: bool,

    /// Set on the cycle the spin-up gate released the feed
    pub spin_up_outcome: Option<SpinUpOutcome>,

    pub desync: bool,

    /// The tunable store could not be refreshed
    pub store_error: bool,

    /// The tunable store holds values which are out of range, their defaults are used instead
    pub invalid_tunables: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ShooterHw {
    /// Get the shooter actuators from a simulated bus.
    pub fn from_sim_bus(bus: &SimBus, params: &Params) -> Self {
        Self {
            leader: Box::new(bus.driver(params.leader_id)),
            followers: params
                .follower_ids
                .iter()
                .map(|id| Box::new(bus.driver(*id)) as Box<dyn ActDriver>)
                .collect(),
            feed: Box::new(bus.driver(params.feed_id)),
        }
    }
}

impl State for ShooterCtrl {
    type InitData = Params;
    type InitError = ParamsError;

    type InputData = InputData;
    type OutputData = ShooterTm;
    type StatusReport = StatusReport;
    type ProcError = Infallible;

    /// Initialise the shooter.
    ///
    /// Checks the parameters match the hardware, configures every actuator and leaves them
    /// stopped.
    fn init(&mut self, params: Self::InitData) -> Result<(), Self::InitError> {
        params.are_valid()?;

        check_id("leader", params.leader_id, self.group.leader_id())?;
        check_id("feed", params.feed_id, self.feed.id())?;

        let follower_ids = self.group.follower_ids();
        if follower_ids.len() != params.follower_ids.len() {
            return Err(ParamsError::FollowerCountMismatch {
                expected: params.follower_ids.len(),
                found: follower_ids.len(),
            });
        }
        for (expected, found) in params.follower_ids.iter().zip(follower_ids.iter()) {
            check_id("follower", *expected, *found)?;
        }

        self.group.set_gear_ratio(params.gear_ratio);
        self.group.set_at_target_floor_rpm(params.at_target_floor_rpm);

        self.tunables = ShooterTunables::new(&params.tunables);
        self.params = params;

        // Failures are logged by the actuators, and are retried by the next configure
        self.configure().ok();
        self.feed.configure(&self.params.feed_config()).ok();

        self.group.stop();
        self.feed.stop();

        info!("ShooterCtrl initialised");

        Ok(())
    }

    /// Perform one cycle of shooter control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();
        self.time_s = input_data.time_s;

        // ---- MEASUREMENTS ----

        match self.store.refresh() {
            Ok(true) => debug!("Tunable store refreshed"),
            Ok(false) => (),
            Err(e) => {
                warn!("{}", e);
                self.report.store_error = true;
            }
        }

        self.group.refresh();
        self.feed.refresh();

        // ---- TUNABLES ----

        self.apply_tunable_changes();

        // ---- REQUESTS ----

        if let Some(cmd) = input_data.cmd {
            self.pending.push_back(Request::Cmd(cmd));
        }

        while let Some(request) = self.pending.pop_front() {
            self.handle_request(request);
        }

        // ---- COMMANDS ----

        self.step_routine();

        // ---- MONITORING ----

        self.check_desync();

        self.tm = self.build_tm();

        Ok((self.tm.clone(), self.report))
    }
}

impl Archived for ShooterCtrl {
    fn write(&mut self) -> Result<(), ArchiveError> {
        self.arch_tm.serialise(ShooterTmRecord::from(&self.tm))
    }
}

impl ShooterCtrl {
    /// Create a new shooter owning the given actuators and reading its tunables from `store`.
    ///
    /// [`State::init`] must be called before the first cycle.
    pub fn new(hw: ShooterHw, store: Box<dyn TunableStore>) -> Self {
        let params = Params::default();

        Self {
            group: ActuatorGroup::new(hw.leader, hw.followers, params.gear_ratio),
            feed: FeedActuator::new(hw.feed),
            gate: SpinUpGate::new(),
            tunables: ShooterTunables::new(&params.tunables),
            params,
            store,
            pending: VecDeque::new(),
            active: None,
            desync: false,
            time_s: 0.0,
            report: StatusReport::default(),
            tm: ShooterTm::default(),
            arch_tm: Archiver::default(),
        }
    }

    /// Start archiving the telemetry into the session.
    pub fn init_archive(&mut self, session: &Session) -> Result<(), ArchiveError> {
        self.arch_tm = Archiver::from_path(session, "shooter_ctrl/tm.csv")?;
        Ok(())
    }

    // ---- REQUESTS ----

    /// Start the spin-up sequence, optionally overriding the target.
    pub fn start(&mut self, target_override_rpm: Option<f64>) {
        let cmd = match target_override_rpm {
            Some(rpm) => ShooterCmd::RunAtRpmWithFeed { rpm },
            None => ShooterCmd::RunWithFeed,
        };
        self.request(cmd);
    }

    /// End the active command and stop the flywheels and the feed.
    pub fn cancel(&mut self) {
        self.pending.push_back(Request::Cancel);
    }

    /// Execute a command, ending the active one.
    pub fn request(&mut self, cmd: ShooterCmd) {
        self.pending.push_back(Request::Cmd(cmd));
    }

    /// Apply the current gains to the flywheels.
    ///
    /// Does nothing if they are already applied.
    pub fn configure(&mut self) -> Result<(), ActError> {
        let gains = self.tunables.acknowledge_gains(&*self.store);
        let config = self.params.flywheel_config(gains);
        self.group.configure(&config)
    }

    // ---- QUERIES ----

    pub fn is_sequence_active(&self) -> bool {
        self.gate.is_active()
    }

    /// Returns true if the flywheels are at the active target.
    pub fn is_at_target(&self) -> bool {
        let tolerance = self.tunables.spin_up_tolerance.get(&*self.store);
        self.group.is_at_target(self.active_target_rpm(), tolerance)
    }

    pub fn is_ready_to_feed(&self) -> bool {
        self.group.is_running() && self.is_at_target()
    }

    /// The target of the running flywheels, or the tunable target when they are stopped.
    ///
    /// Units: flywheel rpm
    pub fn active_target_rpm(&self) -> f64 {
        match self.group.state() {
            GroupState::Running { target_rpm } => target_rpm,
            GroupState::Off => self.tunables.target_rpm.get(&*self.store),
        }
    }

    pub fn active_cmd(&self) -> Option<ShooterCmd> {
        self.active.map(|(cmd, _)| cmd)
    }

    pub fn mean_velocity_rpm(&self) -> f64 {
        self.group.mean_velocity_rpm()
    }

    pub fn unit_velocities_rpm(&self) -> Vec<f64> {
        self.group.unit_velocities_rpm()
    }

    pub fn velocity_spread_rpm(&self) -> f64 {
        self.group.velocity_spread_rpm()
    }

    pub fn total_current_a(&self) -> f64 {
        self.group.total_current_a()
    }

    pub fn max_temperature_c(&self) -> f64 {
        self.group.max_temperature_c()
    }

    pub fn feed_duty_cycle(&self) -> f64 {
        self.feed.duty_cycle()
    }

    pub fn elapsed_s(&self) -> f64 {
        self.gate.elapsed_s(self.time_s)
    }

    pub fn remaining_timeout_s(&self) -> f64 {
        self.gate.remaining_timeout_s(self.time_s)
    }

    pub fn sequence_state(&self) -> SequenceState {
        match self.gate.state() {
            GateState::Idle => SequenceState::Idle,
            GateState::SpinningUp(_) => SequenceState::SpinningUp,
            GateState::Feeding { .. } => SequenceState::Feeding,
        }
    }

    pub fn sequence_state_name(&self) -> &'static str {
        self.gate.state_name()
    }

    /// Telemetry from the last cycle.
    pub fn tm(&self) -> &ShooterTm {
        &self.tm
    }

    pub fn store(&self) -> &dyn TunableStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn TunableStore {
        &mut *self.store
    }

    // ---- CYCLE ----

    /// Reconfigure the flywheels if any gain changed, and log changes to the other tunables.
    fn apply_tunable_changes(&mut self) {
        self.report.invalid_tunables = !self.tunables.check_all(&*self.store);

        if self.tunables.gains_changed(&*self.store) {
            info!("Shooter gains changed, reconfiguring the flywheels");
            self.configure().ok();
            self.report.gains_applied = true;
        }

        let store = &*self.store;
        let others = vec![
            &mut self.tunables.target_rpm,
            &mut self.tunables.feed_output,
            &mut self.tunables.spin_up_tolerance,
            &mut self.tunables.spin_up_timeout_s,
        ];
        for param in others {
            if param.has_changed(store) {
                let value = param.acknowledge(store);
                info!("Tunable {} changed to {}", param.key(), value);
            }
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Cancel => {
                debug!("Cancel requested");
                self.end_active("cancelled");
            }
            Request::Cmd(cmd) => {
                if !cmd.is_valid() {
                    warn!("Ignoring invalid shooter command {:?}", cmd);
                    return;
                }

                debug!("Shooter command requested: {:?}", cmd);
                self.end_active(&format!("replaced by {}", cmd.name()));
                self.begin(cmd);
            }
        }
    }

    fn begin(&mut self, cmd: ShooterCmd) {
        match cmd {
            ShooterCmd::RunAtRpm { rpm } | ShooterCmd::RunAtRpmWithFeed { rpm } => {
                info!("Target overridden to {:.0} rpm", rpm);
                self.tunables.target_rpm.set(&mut *self.store, rpm);
            }
            _ => (),
        }

        let routine = match Routine::for_cmd(&cmd, self.time_s) {
            Some(r) => r,
            None => {
                info!("Shooter stopped");
                return;
            }
        };

        if routine == Routine::Gated {
            self.gate.start(SpinUp {
                start_time_s: self.time_s,
                target_rpm: self.tunables.target_rpm.get(&*self.store),
                tolerance: self.tunables.spin_up_tolerance.get(&*self.store),
                timeout_s: self.tunables.spin_up_timeout_s.get(&*self.store),
            });
        }

        info!("{} started", cmd.name());
        self.active = Some((cmd, routine));
        self.report.cmd_started = true;
    }

    /// End the active command, if any, then stop the flywheels and the feed.
    fn end_active(&mut self, reason: &str) {
        if let Some((cmd, _)) = self.active.take() {
            info!("{} ended ({})", cmd.name(), reason);
            self.report.cmd_ended = true;
        }

        if self.gate.cancel() {
            debug!("Spin-up sequence ended");
        }
        self.group.stop();
        self.feed.stop();
    }

    /// Issue this cycle's demands for the active routine.
    fn step_routine(&mut self) {
        let routine = match self.active {
            Some((_, r)) => r,
            None => return,
        };

        match routine {
            Routine::Run => {
                let target_rpm = self.tunables.target_rpm.get(&*self.store);
                self.group.run_at_velocity(target_rpm);
            }
            Routine::Gated => {
                let target_rpm = self.tunables.target_rpm.get(&*self.store);
                let tolerance = self.tunables.spin_up_tolerance.get(&*self.store);

                self.group.run_at_velocity(target_rpm);

                let at_target = self.group.is_at_target(target_rpm, tolerance);
                if let Some(outcome) = self.gate.update(self.time_s, at_target) {
                    self.report.spin_up_outcome = Some(outcome);
                }

                if self.gate.is_feeding() {
                    self.feed.run(self.tunables.feed_output.get(&*self.store));
                }
            }
            Routine::FeedOnly => {
                self.feed.run(self.tunables.feed_output.get(&*self.store));
            }
            Routine::Eject {
                end_time_s,
                with_feed,
            } => {
                if self.time_s >= end_time_s {
                    self.end_active("complete");
                } else {
                    self.group.run_at_velocity(self.params.eject_rpm);
                    if with_feed {
                        self.feed.run(self.params.eject_feed_duty);
                    }
                }
            }
        }
    }

    fn check_desync(&mut self) {
        let spread_rpm = self.group.velocity_spread_rpm();
        let desync = spread_rpm > self.params.max_spread_rpm;

        if desync && !self.desync {
            warn!(
                "Flywheels desynchronised, spread of {:.0} rpm exceeds {:.0} rpm",
                spread_rpm, self.params.max_spread_rpm
            );
        } else if !desync && self.desync {
            info!("Flywheels back in sync");
        }

        self.desync = desync;
        self.report.desync = desync;
    }

    fn build_tm(&self) -> ShooterTm {
        let target_rpm = self.active_target_rpm();
        let mean_rpm = self.group.mean_velocity_rpm();

        ShooterTm {
            time_s: self.time_s,
            active_cmd: self.active_cmd().map(|cmd| cmd.name()),
            running: self.group.is_running(),
            target_rpm,
            mean_rpm,
            rpm_error: target_rpm - mean_rpm,
            at_target: self.is_at_target(),
            ready_to_feed: self.is_ready_to_feed(),
            unit_rpm: self.group.unit_velocities_rpm(),
            unit_status: self.group.unit_velocity_status(),
            spread_rpm: self.group.velocity_spread_rpm(),
            desync: self.desync,
            total_current_a: self.group.total_current_a(),
            max_temperature_c: self.group.max_temperature_c(),
            feed_running: self.feed.is_running(),
            feed_duty: self.feed_duty_cycle(),
            feed_rpm: self.feed.velocity_rpm(),
            feed_current_a: self.feed.current_a(),
            feed_temperature_c: self.feed.temperature_c(),
            sequence_state: self.sequence_state(),
            elapsed_s: self.elapsed_s(),
            remaining_timeout_s: self.remaining_timeout_s(),
            last_outcome: self.gate.last_outcome(),
            last_spin_up_time_s: self.gate.last_spin_up_time_s(),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn check_id(
    role: &'static str,
    expected: ActId,
    found: ActId,
) -> Result<(), ParamsError> {
    match expected == found {
        true => Ok(()),
        false => Err(ParamsError::HardwareMismatch {
            role,
            expected,
            found,
        }),
    }
}
