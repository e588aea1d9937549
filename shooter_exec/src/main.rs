//! Main shooter executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Simulated actuator stepping
//!         - Telecommand processing and handling
//!         - Shooter control processing:
//!             - Actuator sensing
//!             - Tunable change handling
//!             - Command and spin-up gate processing
//!             - Actuator demands
//!         - Archiving and telemetry
//!
//! # Modules
//!
//! All modules (e.g. `shooter_ctrl`) shall meet the following requirements:
//!     1. Provide a public struct implementing the `util::module::State` trait.
//!

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use comms_if::tc::{shooter::ShooterCmd, Tc};
use shooter_lib::{
    act_driver::sim::SimBus,
    data_store::{DataStore, SafeModeCause},
    params::{DefaultSequence, ShooterExecParams},
    shooter_ctrl::{self, ShooterCtrl, ShooterHw},
    tc_processor,
    tunable::FileTunableStore,
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use structopt::StructOpt;

// Internal
use util::{
    archive::Archived,
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingTcs, ScriptInterpreter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Flywheel shooter executable.
#[derive(Debug, StructOpt)]
#[structopt(name = "shooter_exec")]
struct Opt {
    /// Telecommand script to execute.
    #[structopt(short, long, parse(from_os_str))]
    script: Option<PathBuf>,

    /// Print debug messages to the terminal as well as to the session log.
    #[structopt(short, long)]
    verbose: bool,

    /// Single command to run for the default sequence duration, used when no script is given.
    /// Without either the default sequence from shooter_exec.toml is run.
    #[structopt(subcommand)]
    cmd: Option<ShooterCmd>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opt = Opt::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("shooter_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let stdout_level = match opt.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    logger_init(stdout_level, LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Flywheel Shooter Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ShooterExecParams = util::params::load("shooter_exec.toml")
        .wrap_err("Could not load exec params")?;
    exec_params
        .are_valid()
        .wrap_err("Invalid exec params")?;
    let ctrl_params: shooter_ctrl::Params = util::params::load("shooter_ctrl.toml")
        .wrap_err("Could not load ShooterCtrl params")?;

    // Keep a copy of the parameters used with the session
    session
        .save_json("params/shooter_exec.json", &exec_params)
        .and_then(|_| session.save_json("params/shooter_ctrl.json", &ctrl_params))
        .unwrap_or_else(|e| warn!("Could not save the parameters into the session: {}", e));

    info!("Exec parameters loaded");

    let cycle_period_s = exec_params.cycle_period_s;
    let cycle_frequency_hz = 1.0 / cycle_period_s;

    // ---- INITIALISE TC SOURCE ----

    let mut script = match opt.script {
        Some(ref path) => {
            info!("Loading script from {:?}", path);
            ScriptInterpreter::new(path).wrap_err("Failed to load script")?
        }
        None => {
            let seq = &exec_params.default_sequence;
            let cmd = opt.cmd.unwrap_or(ShooterCmd::RunAtRpmWithFeed {
                rpm: seq.target_rpm,
            });
            info!("No script provided, running {} for {:.02} s", cmd.name(), seq.duration_s);
            single_cmd_script(cmd, seq)
                .wrap_err("Failed to build the default sequence")?
        }
    };

    info!(
        "Loaded script lasts {:.02} s and contains {} TCs\n",
        script.get_duration(),
        script.get_num_tcs()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let bus = SimBus::new(exec_params.sim);
    info!("Simulated actuator bus initialised");

    let tunables_path = util::params::get_path(&exec_params.tunables_file)
        .wrap_err("Could not find the tunables file")?;
    let store = FileTunableStore::new(&tunables_path)
        .wrap_err("Failed to load the tunables file")?;
    info!("Tunables loaded from {:?}", store.path());

    let mut shooter_ctrl = ShooterCtrl::new(
        ShooterHw::from_sim_bus(&bus, &ctrl_params),
        Box::new(store),
    );
    shooter_ctrl
        .init(ctrl_params)
        .wrap_err("Failed to initialise ShooterCtrl")?;
    shooter_ctrl
        .init_archive(&session)
        .wrap_err("Failed to initialise the ShooterCtrl archive")?;
    info!("ShooterCtrl init complete");

    let mut ds = DataStore::new(shooter_ctrl);

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // Clear items that need wiping at the start of the cycle
        ds.cycle_start(cycle_frequency_hz, session::get_elapsed_seconds());

        // ---- SIMULATION ----

        bus.step(cycle_period_s);

        // ---- TELECOMMAND PROCESSING ----

        match script.get_pending_tcs(ds.time_s) {
            PendingTcs::None => (),
            PendingTcs::Some(tc_vec) => {
                for tc in tc_vec.iter() {
                    tc_processor::exec(&mut ds, tc);
                }
            }
            // Exit if end of script reached
            PendingTcs::EndOfScript => {
                info!("End of TC script reached, stopping");
                break;
            }
        }

        // ---- CONTROL ALGORITHM PROCESSING ----

        run_shooter_ctrl(&mut ds);

        // ---- WRITE ARCHIVES ----

        if let Err(e) = ds.shooter_ctrl.write() {
            warn!("Could not archive ShooterCtrl telemetry: {}", e);
        }

        // ---- TELEMETRY ----

        if ds.is_1_hz_cycle {
            info!("{}", ds.shooter_tm.summary());
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match Duration::from_secs_f64(cycle_period_s).checked_sub(cycle_dur) {
            Some(d) => {
                if ds.num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                    info!("Cycle overruns cleared");
                }
                ds.num_consec_cycle_overruns = 0;
                ds.make_unsafe(SafeModeCause::CycleOverruns).ok();
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    cycle_dur.as_secs_f64() - cycle_period_s
                );
                ds.num_consec_cycle_overruns += 1;

                // If number of overruns greater than the limit make safe
                if ds.num_consec_cycle_overruns > exec_params.max_consec_cycle_overruns {
                    if !ds.safe {
                        error!(
                            "More than {} consecutive cycle overruns",
                            exec_params.max_consec_cycle_overruns
                        );
                    }
                    ds.make_safe(SafeModeCause::CycleOverruns);
                }
            }
        }

        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    // Leave everything stopped
    ds.shooter_ctrl.cancel();
    ds.cycle_start(cycle_frequency_hz, session::get_elapsed_seconds());
    run_shooter_ctrl(&mut ds);
    ds.shooter_ctrl.write().ok();

    info!("Final state: {}", ds.shooter_tm.summary());
    info!("End of execution");

    Ok(())
}

/// Run one cycle of ShooterCtrl, storing its outputs in the data store.
fn run_shooter_ctrl(ds: &mut DataStore) {
    match ds.shooter_ctrl.proc(&ds.shooter_ctrl_input) {
        Ok((tm, rpt)) => {
            ds.shooter_tm = tm;
            ds.shooter_ctrl_status_rpt = rpt;
        }
        Err(e) => match e {},
    }

    debug!("ShooterCtrl status: {:?}", ds.shooter_ctrl_status_rpt);
}

/// Build a script which issues `cmd`, then stops the shooter after the sequence's duration.
fn single_cmd_script(cmd: ShooterCmd, seq: &DefaultSequence) -> Result<ScriptInterpreter, Report> {
    let start = serde_json::to_string(&Tc::Shooter(cmd))?;
    let stop = serde_json::to_string(&Tc::Shooter(ShooterCmd::Stop))?;

    let script = format!("0.0: {};\n{:.3}: {};\n", start, seq.duration_s, stop);

    ScriptInterpreter::from_script(&script).wrap_err("Invalid default sequence")
}
