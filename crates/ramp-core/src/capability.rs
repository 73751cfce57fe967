//! External capabilities
//!
//! The ramp never implements conversion, loan bookkeeping, cosigning, or rate
//! encoding itself. It drives those collaborators through the traits below.
//! Every mutating method runs inside a [`Ledger::call`] opened by the ramp, so
//! `ctx.caller` is the ramp and `ctx.value` is any native value it attached.

use std::sync::Arc;

use ramp_common::{Address, Amount, Currency, FeeSchedule, LoanRequestId, Rate, Result};
use ramp_ledger::{CallContext, Ledger};

/// Currency converter (AMM, aggregator, market maker)
pub trait Converter: Send + Sync {
    fn address(&self) -> Address;

    /// Input amount of `from` required to receive exactly `exact_output` of `to`
    fn estimate_input(
        &self,
        ledger: &Ledger,
        from: Currency,
        to: Currency,
        exact_output: Amount,
    ) -> Result<Amount>;

    /// Deliver exactly `exact_output` of `to` to the caller, spending at most
    /// `max_input` of `from`, and return the amount it claims to have spent.
    ///
    /// Token input is collected with `transfer_from` against the allowance the
    /// caller granted; native input arrives as `ctx.value` and any change must
    /// be sent back.
    fn convert_exact(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        from: Currency,
        to: Currency,
        exact_output: Amount,
        max_input: Amount,
    ) -> Result<Amount>;
}

/// Decoder for opaque oracle data
pub trait RateOracle: Send + Sync {
    fn address(&self) -> Address;

    /// Decode `(tokens, equivalent)` from the caller-supplied blob
    fn decode_rate(&self, oracle_data: &[u8]) -> Result<Rate>;
}

/// Third party that insures a loan for a fee
pub trait Cosigner: Send + Sync {
    fn address(&self) -> Address;

    /// Fee, in loan-currency units, charged for cosigning `loan_id`
    fn request_cost(&self, ledger: &Ledger, loan_id: &LoanRequestId, data: &[u8]) -> Result<Amount>;

    /// Agree (or decline) to cosign `loan_id`
    fn request_cosign(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        loan_id: &LoanRequestId,
        data: &[u8],
    ) -> Result<bool>;
}

/// Arguments forwarded to [`LoanSystem::lend`]
#[derive(Clone, Copy)]
pub struct LoanLend<'a> {
    pub loan_id: &'a LoanRequestId,
    pub oracle_data: &'a [u8],
    pub cosigner: Option<&'a dyn Cosigner>,
    pub cosigner_limit_cost: Amount,
    pub cosigner_data: &'a [u8],
    pub callback_data: &'a [u8],
}

/// Loan-management system that keeps the books in its accounting token
pub trait LoanSystem: Send + Sync {
    fn address(&self) -> Address;

    /// Accounting token every lend and payment is settled in
    fn token(&self) -> Address;

    /// Fee charged on top of token payments
    fn fee_schedule(&self) -> FeeSchedule;

    /// Principal requested by the borrower, in loan-currency units
    fn requested_amount(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Amount>;

    /// Amount still owed, in loan-currency units; zero if never lent or fully paid
    fn outstanding_balance(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Amount>;

    /// Oracle that prices the loan currency, if the loan has one
    fn oracle(&self, ledger: &Ledger, loan_id: &LoanRequestId)
        -> Result<Option<Arc<dyn RateOracle>>>;

    /// Fund `loan_id`, collecting the principal (and cosigner cost) from the caller
    fn lend(&self, ledger: &mut Ledger, ctx: CallContext, request: LoanLend<'_>) -> Result<()>;

    /// Pay `amount` loan-currency units on behalf of `payer`, collecting tokens
    /// (plus fee) from the caller; returns the amount applied to the debt
    fn pay_from(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        payer: Address,
        loan_id: &LoanRequestId,
        amount: Amount,
        oracle_data: &[u8],
    ) -> Result<Amount>;

    /// Hand ownership of the debt from the caller to `to`
    fn transfer_debt(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        loan_id: &LoanRequestId,
        to: Address,
    ) -> Result<()>;
}
