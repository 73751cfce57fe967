//! # Ramp Simulator
//!
//! Runs lend and pay scenarios through the converter ramp against the
//! reference mocks and reports every settlement.
//!
//! - [`config`]: file + environment loading of [`SimConfig`]
//! - [`scenario`]: tokens, routes, accounts, loans, and steps
//! - [`runner`]: builds the world and executes the steps

pub mod config;
pub mod runner;
pub mod scenario;

pub use config::{LogFormat, LogSettings, SimConfig};
pub use runner::{simulate, Simulation, SimulationReport, StepOutcome, StepReport};
pub use scenario::{Scenario, ScenarioError, Step};

/// Simulator version
pub const SIM_VERSION: &str = env!("CARGO_PKG_VERSION");
