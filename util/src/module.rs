//! Cyclic module interface
//!
//! Every module run by the `shooter_exec` main loop (currently just `ShooterCtrl`) implements
//! [`State`].

// ---------------------------------------------------------------------------
// MODULE STATE
// ---------------------------------------------------------------------------

/// A module stepped once per control cycle.
///
/// Modules are built around the equipment they own, initialised once with their parameters, and
/// then `proc`-ed every cycle. Anything a module needs from outside during a cycle arrives in its
/// `InputData`; everything it publishes leaves in the `OutputData` and `StatusReport`.
pub trait State {
    /// Usually the module's parameters
    type InitData;
    type InitError;

    type InputData;

    /// Telemetry produced each cycle
    type OutputData;

    /// Events raised during the cycle, cleared at the start of the next one
    type StatusReport;

    /// Modules which degrade rather than fail use `std::convert::Infallible`
    type ProcError;

    /// Check and apply the parameters, and bring the equipment to a known state.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError>;

    /// Run one cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>;
}
