//! # Ramp Mocks
//!
//! Reference collaborators for the converter ramp. They implement the
//! `ramp-core` capability traits with just enough behavior to exercise every
//! settlement path in tests and in the simulator.
//!
//! - [`MockLoanSystem`]: loan requests, lending, payments with fee, debt ownership
//! - [`FixedRateConverter`] / [`ScriptedConverter`]: conversion counterparties
//! - [`ReentrantConverter`] / [`ReentrantCosigner`]: call back into the ramp
//!   mid-settlement
//! - [`TestCosigner`]: per-loan fee, optional refusal
//! - [`TestRateOracle`]: 64-byte `(tokens, equivalent)` oracle data

pub mod converter;
pub mod cosigner;
pub mod loan_system;
pub mod oracle;
pub mod reentrant;

pub use converter::{FixedRateConverter, Script, ScriptedConverter};
pub use cosigner::TestCosigner;
pub use loan_system::{LoanRecord, LoanStatus, MockLoanSystem};
pub use oracle::TestRateOracle;
pub use reentrant::{ReentrantConverter, ReentrantCosigner, ReentryCall, ReentryOutcome};
