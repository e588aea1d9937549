//! # Shooter Control Cycle Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::tc::shooter::ShooterCmd;
use shooter_lib::{
    act_driver::sim::{SimBus, SimParams},
    shooter_ctrl::{InputData, Params, ShooterCtrl, ShooterHw},
    tunable::MemTunableStore,
};
use util::module::State;

const CYCLE_PERIOD_S: f64 = 0.02;

fn shooter_cycle_benchmark(c: &mut Criterion) {
    // ---- Build a simulated shooter ----

    let bus = SimBus::new(SimParams::default());
    let params = Params::default();

    let mut ctrl = ShooterCtrl::new(
        ShooterHw::from_sim_bus(&bus, &params),
        Box::new(MemTunableStore::new()),
    );
    ctrl.init(params).unwrap();

    // Start a gated sequence so that every part of the cycle is exercised
    let mut time_s = 0.0;
    let mut input = InputData {
        time_s,
        cmd: Some(ShooterCmd::RunAtRpmWithFeed { rpm: 3000.0 }),
    };
    ctrl.proc(&input).unwrap();
    input.cmd = None;

    // ---- Run benchmark ----

    c.bench_function("shooter_ctrl cycle", |b| {
        b.iter(|| {
            time_s += CYCLE_PERIOD_S;
            input.time_s = time_s;

            bus.step(CYCLE_PERIOD_S);
            ctrl.proc(&input).unwrap()
        })
    });
}

criterion_group!(benches, shooter_cycle_benchmark);
criterion_main!(benches);
