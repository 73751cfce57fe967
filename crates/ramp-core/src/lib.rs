//! # Ramp Core
//!
//! Converter ramp: lends to, and pays down, loans of an external loan system
//! using a currency other than the loan system's accounting token.
//!
//! ## Components
//!
//! - [`currency`]: native / token pulls, pushes, and balances
//! - [`gateway`]: exact-output conversions through an external [`Converter`]
//! - [`cost`]: accounting-token requirement of a lend or a payment
//! - [`oracle`]: rate resolution and relay of opaque oracle data
//! - [`settlement`]: atomic lend / pay with refund and conservation check
//! - [`ConverterRamp`]: quotes (`lend_cost`, `pay_cost_with_fee`) and entry points
//!
//! ## Flow
//!
//! ```text
//! quote ─► choose max spend ─► pull ─► convert ─► forward ─► refund
//! ```
//!
//! The whole settlement runs inside one ledger call, so a failure at any stage
//! leaves balances, allowances, loan state, and events exactly as they were.

pub mod capability;
pub mod config;
pub mod cost;
pub mod currency;
pub mod gateway;
pub mod oracle;
pub mod ramp;
pub mod settlement;

pub use capability::{Converter, Cosigner, LoanLend, LoanSystem, RateOracle};
pub use config::RampConfig;
pub use cost::{LendAmounts, PayAmounts};
pub use gateway::{ConversionIntent, ConversionOutcome};
pub use oracle::{OracleReading, ORACLE_READ_EVENT};
pub use ramp::ConverterRamp;
pub use settlement::{LendRequest, PayRequest, SettlementKind, SettlementReceipt, SettlementStage};
