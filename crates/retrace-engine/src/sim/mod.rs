//! Simulation support
//!
//! [`InMemoryRemote`] stands in for a backend in tests and in the
//! `retrace-sim` binary; [`run_simulator`] drives an engine through a
//! randomized campaign and reports invariant violations.

mod remote;
mod simulator;

pub use remote::{CallRecord, InMemoryRemote, RemoteConfig};
pub use simulator::{
    run_simulator, SimulatedStep, SimulatorConfig, SimulatorReport, SimulatorStats, Violation,
};
