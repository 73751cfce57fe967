//! Settlement orchestrator
//!
//! Executes lends and payments as one all-or-nothing ledger call:
//!
//! - guard the attached value against the declared spend mode
//! - relay the oracle rate and check the quote against the budget
//! - pull the full budget, convert exactly what the loan system needs
//! - forward to the loan system under a single-use allowance
//! - refund the unspent input and any accounting-token surplus
//! - verify the ramp holds exactly what it held before the call
//!
//! Any failure reverts every effect of the call, including the pull.

use std::fmt;
use std::sync::Arc;

use ramp_common::{Address, Amount, Currency, LoanRequestId, RampError, Result};
use ramp_ledger::{CallContext, Ledger};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::capability::{Converter, Cosigner, LoanLend};
use crate::cost;
use crate::currency;
use crate::gateway::{self, ConversionIntent, ConversionOutcome};
use crate::oracle::{self, OracleReading};
use crate::ramp::ConverterRamp;

/// Progress of one settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStage {
    Start,
    Pulled,
    Converted,
    Forwarded,
    Refunded,
    Done,
    Failed,
}

impl fmt::Display for SettlementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementStage::Start => "start",
            SettlementStage::Pulled => "pulled",
            SettlementStage::Converted => "converted",
            SettlementStage::Forwarded => "forwarded",
            SettlementStage::Refunded => "refunded",
            SettlementStage::Done => "done",
            SettlementStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementKind {
    Lend,
    Pay,
}

impl fmt::Display for SettlementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettlementKind::Lend => f.write_str("lend"),
            SettlementKind::Pay => f.write_str("pay"),
        }
    }
}

/// Lend request
#[derive(Clone)]
pub struct LendRequest {
    pub converter: Arc<dyn Converter>,
    /// Currency the lender spends
    pub from: Currency,
    /// Most `from` the ramp may pull
    pub max_spend: Amount,
    pub cosigner: Option<Arc<dyn Cosigner>>,
    /// Highest cosigner fee the lender accepts
    pub cosigner_limit_cost: Amount,
    pub loan_id: LoanRequestId,
    pub oracle_data: Vec<u8>,
    pub cosigner_data: Vec<u8>,
    pub callback_data: Vec<u8>,
}

/// Payment request
#[derive(Clone)]
pub struct PayRequest {
    pub converter: Arc<dyn Converter>,
    /// Currency the payer spends
    pub from: Currency,
    /// Loan-currency amount to pay; capped at the outstanding balance
    pub pay_amount: Amount,
    /// Most `from` the ramp may pull
    pub max_spend: Amount,
    pub loan_id: LoanRequestId,
    pub oracle_data: Vec<u8>,
}

/// Record of a completed settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReceipt {
    pub id: Uuid,
    pub kind: SettlementKind,
    pub loan_id: LoanRequestId,
    pub caller: Address,
    /// Currency the caller spent
    pub input: Currency,
    /// Input taken from the caller at the start
    pub pulled: Amount,
    /// Input the converter consumed
    pub spent: Amount,
    /// Input returned to the caller
    pub refunded: Amount,
    /// Accounting tokens returned to the caller
    pub surplus_refunded: Amount,
    /// Accounting tokens forwarded to the loan system
    pub accounting_amount: Amount,
    /// Loan-currency amount credited on the loan ledger
    pub applied: Amount,
    /// Rate used, absent when nothing was settled
    pub oracle: Option<OracleReading>,
    pub stage: SettlementStage,
    /// Unix milliseconds
    pub settled_at: i64,
}

impl SettlementReceipt {
    fn new(kind: SettlementKind, loan_id: LoanRequestId, caller: Address, input: Currency) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            loan_id,
            caller,
            input,
            pulled: 0,
            spent: 0,
            refunded: 0,
            surplus_refunded: 0,
            accounting_amount: 0,
            applied: 0,
            oracle: None,
            stage: SettlementStage::Start,
            settled_at: 0,
        }
    }

    fn advance(&mut self, next: SettlementStage) {
        debug!(settlement = %self.id, kind = %self.kind, from = %self.stage, to = %next, "stage");
        self.stage = next;
    }

    fn finish(mut self) -> Self {
        self.advance(SettlementStage::Done);
        self.settled_at = chrono::Utc::now().timestamp_millis();
        self
    }
}

/// Balances of the ramp before anything was pulled
struct Baseline {
    holder: Address,
    balances: Vec<(Currency, Amount)>,
}

impl Baseline {
    /// Snapshot `currencies`; native value attached to the current call does
    /// not count as the holder's own
    fn capture(ledger: &Ledger, holder: Address, currencies: &[Currency], attached: Amount) -> Self {
        let mut balances: Vec<(Currency, Amount)> = Vec::with_capacity(currencies.len());
        for &currency in currencies {
            if balances.iter().any(|(c, _)| *c == currency) {
                continue;
            }
            let mut balance = currency::balance_of(ledger, currency, holder);
            if currency.is_native() {
                balance = balance.saturating_sub(attached);
            }
            balances.push((currency, balance));
        }
        Self { holder, balances }
    }

    /// Amount held above the baseline
    fn surplus(&self, ledger: &Ledger, currency: Currency) -> Amount {
        let base = self
            .balances
            .iter()
            .find(|(c, _)| *c == currency)
            .map(|(_, b)| *b)
            .unwrap_or(0);
        currency::balance_of(ledger, currency, self.holder).saturating_sub(base)
    }

    fn verify(&self, ledger: &Ledger) -> Result<()> {
        for &(currency, expected) in &self.balances {
            let actual = currency::balance_of(ledger, currency, self.holder);
            if actual != expected {
                return Err(RampError::InvariantViolation(format!(
                    "ramp balance of {} is {} after settlement, expected {}",
                    currency, actual, expected
                )));
            }
        }
        Ok(())
    }
}

impl ConverterRamp {
    /// Lend `request.loan_id`, paying with `request.from`
    ///
    /// `value` is the native value the caller attaches; it must equal
    /// `max_spend` when spending native currency and be zero otherwise. The
    /// caller becomes the owner of the debt.
    #[instrument(skip_all, fields(loan_id = %request.loan_id, %caller, from = %request.from, max_spend = request.max_spend))]
    pub fn lend(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        value: Amount,
        request: &LendRequest,
    ) -> Result<SettlementReceipt> {
        let mut receipt = SettlementReceipt::new(SettlementKind::Lend, request.loan_id, caller, request.from);
        let result = ledger.call(caller, self.address(), value, |ledger, ctx| {
            self.execute_lend(ledger, ctx, request, &mut receipt)
        });
        self.conclude(receipt, result)
    }

    /// Pay up to `request.pay_amount` on `request.loan_id` for the caller
    ///
    /// Paying a loan that owes nothing succeeds without moving funds; any
    /// attached native value is returned.
    #[instrument(skip_all, fields(loan_id = %request.loan_id, %caller, from = %request.from, pay_amount = request.pay_amount, max_spend = request.max_spend))]
    pub fn pay(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        value: Amount,
        request: &PayRequest,
    ) -> Result<SettlementReceipt> {
        let mut receipt = SettlementReceipt::new(SettlementKind::Pay, request.loan_id, caller, request.from);
        let result = ledger.call(caller, self.address(), value, |ledger, ctx| {
            self.execute_pay(ledger, ctx, request, &mut receipt)
        });
        self.conclude(receipt, result)
    }

    fn conclude(&self, mut receipt: SettlementReceipt, result: Result<()>) -> Result<SettlementReceipt> {
        match result {
            Ok(()) => {
                let receipt = receipt.finish();
                info!(
                    settlement = %receipt.id,
                    kind = %receipt.kind,
                    loan_id = %receipt.loan_id,
                    spent = receipt.spent,
                    refunded = receipt.refunded,
                    applied = receipt.applied,
                    "settlement complete"
                );
                Ok(receipt)
            }
            Err(e) => {
                let reached = receipt.stage;
                receipt.advance(SettlementStage::Failed);
                warn!(settlement = %receipt.id, kind = %receipt.kind, stage = %reached, error = %e, "settlement reverted");
                Err(e)
            }
        }
    }

    fn execute_lend(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        request: &LendRequest,
        receipt: &mut SettlementReceipt,
    ) -> Result<()> {
        Self::check_payable(request.from, request.max_spend, ctx.value)?;

        let token = self.accounting_currency();
        let baseline = Baseline::capture(ledger, self.address(), &[request.from, token], ctx.value);

        let reading = oracle::relay(
            ledger,
            self.address(),
            self.loan_system(),
            &request.loan_id,
            &request.oracle_data,
        )?;
        receipt.oracle = Some(reading);

        let cosigner = request.cosigner.as_deref();
        let amounts = self.lend_amounts_at(
            ledger,
            cosigner,
            &request.loan_id,
            &request.cosigner_data,
            reading.rate,
        )?;
        self.check_budget(ledger, request.converter.as_ref(), request.from, amounts.tokens, request.max_spend)?;

        let conversion = self.pull_and_convert(
            ledger,
            ctx,
            request.converter.as_ref(),
            request.from,
            amounts.tokens,
            request.max_spend,
            receipt,
        )?;
        receipt.accounting_amount = amounts.tokens;

        let loan_system = self.loan_system();
        self.forward(ledger, amounts.tokens, |ledger, forward_ctx| {
            loan_system.lend(
                ledger,
                forward_ctx,
                LoanLend {
                    loan_id: &request.loan_id,
                    oracle_data: &request.oracle_data,
                    cosigner,
                    cosigner_limit_cost: request.cosigner_limit_cost,
                    cosigner_data: &request.cosigner_data,
                    callback_data: &request.callback_data,
                },
            )
        })?;
        ledger.call(self.address(), loan_system.address(), 0, |ledger, forward_ctx| {
            loan_system.transfer_debt(ledger, forward_ctx, &request.loan_id, ctx.caller)
        })?;
        receipt.applied = amounts.principal;
        receipt.advance(SettlementStage::Forwarded);

        self.refund(ledger, ctx.caller, &baseline, request.from, conversion, receipt)
    }

    fn execute_pay(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        request: &PayRequest,
        receipt: &mut SettlementReceipt,
    ) -> Result<()> {
        Self::check_payable(request.from, request.max_spend, ctx.value)?;

        let loan_system = self.loan_system();
        let outstanding = loan_system.outstanding_balance(ledger, &request.loan_id)?;
        if outstanding == 0 || request.pay_amount == 0 {
            debug!(outstanding, "nothing to pay");
            currency::push(ledger, self.address(), Currency::Native, ctx.caller, ctx.value)?;
            return Ok(());
        }

        let token = self.accounting_currency();
        let baseline = Baseline::capture(ledger, self.address(), &[request.from, token], ctx.value);

        let reading = oracle::relay(
            ledger,
            self.address(),
            loan_system,
            &request.loan_id,
            &request.oracle_data,
        )?;
        receipt.oracle = Some(reading);

        let amounts = cost::pay_requirement(
            request.pay_amount,
            outstanding,
            reading.rate,
            loan_system.fee_schedule(),
        )?;
        self.check_budget(ledger, request.converter.as_ref(), request.from, amounts.total, request.max_spend)?;

        let conversion = self.pull_and_convert(
            ledger,
            ctx,
            request.converter.as_ref(),
            request.from,
            amounts.total,
            request.max_spend,
            receipt,
        )?;
        receipt.accounting_amount = amounts.total;

        let applied = self.forward(ledger, amounts.total, |ledger, forward_ctx| {
            loan_system.pay_from(
                ledger,
                forward_ctx,
                ctx.caller,
                &request.loan_id,
                amounts.effective,
                &request.oracle_data,
            )
        })?;
        receipt.applied = applied;
        receipt.advance(SettlementStage::Forwarded);

        self.refund(ledger, ctx.caller, &baseline, request.from, conversion, receipt)
    }

    fn check_budget(
        &self,
        ledger: &Ledger,
        converter: &dyn Converter,
        from: Currency,
        tokens: Amount,
        max_spend: Amount,
    ) -> Result<()> {
        let cost = gateway::estimate_input(ledger, converter, from, self.accounting_currency(), tokens)?;
        debug!(tokens, cost, max_spend, "quoted");
        if cost > max_spend {
            return Err(RampError::CostExceedsBudget { cost, max_spend });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn pull_and_convert(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        converter: &dyn Converter,
        from: Currency,
        tokens: Amount,
        max_spend: Amount,
        receipt: &mut SettlementReceipt,
    ) -> Result<ConversionOutcome> {
        currency::pull(ledger, ctx, from, max_spend)?;
        receipt.pulled = max_spend;
        receipt.advance(SettlementStage::Pulled);

        let conversion = gateway::convert_exact(
            ledger,
            self.address(),
            &ConversionIntent {
                converter,
                from,
                to: self.accounting_currency(),
                exact_output: tokens,
                max_input: max_spend,
            },
        )?;
        receipt.spent = conversion.spent;
        receipt.advance(SettlementStage::Converted);
        Ok(conversion)
    }

    /// Call the loan system with an allowance of exactly `tokens`
    ///
    /// Once the call returns the allowance goes back to what it was before,
    /// which is zero outside a nested settlement.
    fn forward<T, F>(&self, ledger: &mut Ledger, tokens: Amount, f: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger, CallContext) -> Result<T>,
    {
        let token = self.loan_system().token();
        let spender = self.loan_system().address();
        let outer = ledger.allowance(token, self.address(), spender);
        ledger.approve(token, self.address(), spender, tokens);
        let result = ledger.call(self.address(), spender, 0, f);
        ledger.approve(token, self.address(), spender, outer);
        result
    }

    fn refund(
        &self,
        ledger: &mut Ledger,
        caller: Address,
        baseline: &Baseline,
        from: Currency,
        conversion: ConversionOutcome,
        receipt: &mut SettlementReceipt,
    ) -> Result<()> {
        let residual = baseline.surplus(ledger, from);
        currency::push(ledger, self.address(), from, caller, residual)?;
        receipt.refunded = residual;

        let token = self.accounting_currency();
        if token != from {
            let surplus = baseline.surplus(ledger, token);
            currency::push(ledger, self.address(), token, caller, surplus)?;
            receipt.surplus_refunded = surplus;
        }
        debug!(
            residual,
            surplus = receipt.surplus_refunded,
            spent = conversion.spent,
            "refunded"
        );
        receipt.advance(SettlementStage::Refunded);

        match baseline.verify(ledger) {
            Ok(()) => Ok(()),
            Err(e) if self.config().enforce_conservation => Err(e),
            Err(e) => {
                warn!(error = %e, "conservation check failed");
                Ok(())
            }
        }
    }
}
