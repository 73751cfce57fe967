//! Error types for the Ramp settlement engine
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::types::{address::Address, currency::Currency, loan_id::LoanRequestId, Amount};

/// Result type alias using RampError
pub type Result<T> = std::result::Result<T, RampError>;

/// Unified error type for Ramp operations
#[derive(Debug, Error)]
pub enum RampError {
    // Currency movement errors
    #[error("Currency error: {0}")]
    Currency(#[from] CurrencyError),

    // Converter errors
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),

    // Loan system errors
    #[error("Loan error: {0}")]
    Loan(#[from] LoanError),

    // Oracle errors
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    // Host ledger errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Arithmetic errors
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Attached native value does not match the declared spend mode
    #[error("Payable mismatch for {currency}: expected attached value {expected}, got {attached}")]
    PayableMismatch {
        currency: Currency,
        expected: Amount,
        attached: Amount,
    },

    /// Required input exceeds the caller's declared maximum
    #[error("Cost exceeds budget: cost {cost} > max spend {max_spend}")]
    CostExceedsBudget { cost: Amount, max_spend: Amount },

    /// The ramp would retain or lose funds across a call
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while pulling or pushing currency
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CurrencyError {
    #[error("Invalid transfer mode for {currency}: attached value {attached}, amount {amount}")]
    InvalidTransferMode {
        currency: Currency,
        attached: Amount,
        amount: Amount,
    },

    #[error("Transfer of {amount} {currency} from {payer} failed: {source}")]
    TransferFailed {
        currency: Currency,
        payer: Address,
        amount: Amount,
        #[source]
        source: LedgerError,
    },

    #[error("Native transfer of {amount} to {recipient} failed: {source}")]
    NativeTransferFailed {
        recipient: Address,
        amount: Amount,
        #[source]
        source: LedgerError,
    },

    #[error("Token transfer of {amount} {token} to {recipient} failed: {source}")]
    TokenTransferFailed {
        token: Address,
        recipient: Address,
        amount: Amount,
        #[source]
        source: LedgerError,
    },
}

/// Converter errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("No route from {from} to {to}")]
    NoRoute { from: Currency, to: Currency },

    #[error("Conversion failed: required output {expected}, received {received}")]
    OutputShortfall { expected: Amount, received: Amount },

    #[error("Conversion failed: spent {spent} above max input {max_input}")]
    SpentAboveMax { spent: Amount, max_input: Amount },

    #[error("Conversion failed: {0}")]
    Failed(String),
}

/// Loan system errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("Loan not found: {0}")]
    NotFound(LoanRequestId),

    #[error("Loan {0} is not open for lending")]
    NotRequested(LoanRequestId),

    #[error("Loan {0} is not ongoing")]
    NotOngoing(LoanRequestId),

    #[error("Loan {0} already exists")]
    AlreadyExists(LoanRequestId),

    #[error("Cosigner declined loan {0}")]
    CosignerDeclined(LoanRequestId),

    #[error("Cosigner cost {cost} exceeds limit {limit}")]
    CosignerCostExceeded { cost: Amount, limit: Amount },

    #[error("Caller {caller} does not own debt {loan_id}")]
    NotDebtOwner {
        loan_id: LoanRequestId,
        caller: Address,
    },

    #[error("Loan system rejected the call: {0}")]
    Rejected(String),
}

/// Oracle errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Malformed oracle data: {0}")]
    MalformedData(String),

    #[error("Oracle provided invalid rate: tokens {tokens}, equivalent {equivalent}")]
    InvalidRate { tokens: u128, equivalent: u128 },

    #[error("Oracle {0} is not registered")]
    Unknown(Address),
}

/// Host ledger errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance of {asset} for {account}: required {required}, available {available}")]
    InsufficientBalance {
        asset: Currency,
        account: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Insufficient allowance on {token} from {owner} to {spender}: required {required}, allowed {allowed}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
        required: Amount,
        allowed: Amount,
    },

    #[error("Account {0} rejects native transfers")]
    NativeRejected(Address),

    #[error("Balance overflow for {0}")]
    Overflow(Address),

    #[error("Storage codec error: {0}")]
    Codec(String),
}

/// Arithmetic errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MathError {
    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Division by zero")]
    DivisionByZero,
}

// Implement From for common external error types
impl From<serde_json::Error> for RampError {
    fn from(err: serde_json::Error) -> Self {
        RampError::Internal(err.to_string())
    }
}

impl From<anyhow::Error> for RampError {
    fn from(err: anyhow::Error) -> Self {
        RampError::Internal(err.to_string())
    }
}
