//! # Ramp Common
//!
//! Shared types, rounding math, and errors for the Ramp settlement engine.
//!
//! ## Core Types
//!
//! - [`Address`]: 20-byte account identifier
//! - [`Currency`]: native currency or a token, with the native sentinel address
//! - [`LoanRequestId`]: opaque 32-byte loan identifier owned by the loan system
//! - [`Rate`]: oracle `(tokens, equivalent)` pair used to convert loan currency into tokens
//! - [`FeeSchedule`]: loan-system payment fee expressed as `rate / base`
//!
//! ## Math
//!
//! - [`math`]: multiply-then-divide rounded up, computed
//!   on 256-bit intermediates so that products never overflow

pub mod error;
pub mod math;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    ConversionError, CurrencyError, LedgerError, LoanError, MathError, OracleError, RampError,
    Result,
};
pub use types::{
    address::Address,
    currency::Currency,
    fee::FeeSchedule,
    loan_id::LoanRequestId,
    rate::Rate,
    Amount,
};

/// Ramp version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Basis-point denominator
pub const BPS_BASE: u128 = 10_000;

/// Default slippage margin added on top of a quote (2%)
pub const DEFAULT_SLIPPAGE_BPS: u32 = 200;
