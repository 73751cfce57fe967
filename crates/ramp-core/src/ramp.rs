//! Converter ramp facade
//!
//! [`ConverterRamp`] answers "how much input do I need" (read-only quotes) and
//! performs the settlements themselves (see [`crate::settlement`]).

use std::sync::Arc;

use ramp_common::{Address, Amount, Currency, LoanRequestId, RampError, Rate, Result};
use ramp_ledger::{Ledger, NativeReceive};
use tracing::{debug, instrument};

use crate::capability::{Converter, Cosigner, LoanSystem};
use crate::config::RampConfig;
use crate::cost::{self, LendAmounts, PayAmounts};
use crate::gateway;
use crate::oracle;

/// Settlement intermediary bound to one loan system
pub struct ConverterRamp {
    address: Address,
    loan_system: Arc<dyn LoanSystem>,
    config: RampConfig,
}

impl ConverterRamp {
    /// Create a ramp with default settings
    pub fn new(address: Address, loan_system: Arc<dyn LoanSystem>) -> Self {
        Self {
            address,
            loan_system,
            config: RampConfig::default(),
        }
    }

    /// Create a ramp with explicit settings
    pub fn with_config(
        address: Address,
        loan_system: Arc<dyn LoanSystem>,
        config: RampConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            address,
            loan_system,
            config,
        })
    }

    /// Register the ramp's account on `ledger`
    ///
    /// The ramp takes native currency only as value attached to its own
    /// settlements, or as change sent back while one of them is executing.
    /// Plain transfers from outside are refused.
    pub fn deploy(&self, ledger: &mut Ledger) {
        ledger.set_native_receive(self.address, NativeReceive::DuringCall);
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn loan_system(&self) -> &dyn LoanSystem {
        self.loan_system.as_ref()
    }

    pub fn config(&self) -> &RampConfig {
        &self.config
    }

    /// Accounting currency of the bound loan system
    pub fn accounting_currency(&self) -> Currency {
        Currency::Token(self.loan_system.token())
    }

    /// Token requirement of lending `loan_id`, without side effects
    pub fn lend_amounts(
        &self,
        ledger: &Ledger,
        cosigner: Option<&dyn Cosigner>,
        loan_id: &LoanRequestId,
        oracle_data: &[u8],
        cosigner_data: &[u8],
    ) -> Result<LendAmounts> {
        let reading = oracle::read_rate(ledger, self.loan_system(), loan_id, oracle_data)?;
        self.lend_amounts_at(ledger, cosigner, loan_id, cosigner_data, reading.rate)
    }

    pub(crate) fn lend_amounts_at(
        &self,
        ledger: &Ledger,
        cosigner: Option<&dyn Cosigner>,
        loan_id: &LoanRequestId,
        cosigner_data: &[u8],
        rate: Rate,
    ) -> Result<LendAmounts> {
        let principal = self.loan_system.requested_amount(ledger, loan_id)?;
        let cosigner_cost = match cosigner {
            Some(cosigner) => cosigner.request_cost(ledger, loan_id, cosigner_data)?,
            None => 0,
        };
        cost::lend_requirement(principal, cosigner_cost, rate)
    }

    /// Token requirement of paying `amount` on `loan_id`, without side effects
    ///
    /// Skips the oracle entirely when nothing is owed.
    pub fn pay_amounts(
        &self,
        ledger: &Ledger,
        loan_id: &LoanRequestId,
        amount: Amount,
        oracle_data: &[u8],
    ) -> Result<PayAmounts> {
        let outstanding = self.loan_system.outstanding_balance(ledger, loan_id)?;
        if outstanding == 0 || amount == 0 {
            return cost::pay_requirement(
                amount,
                outstanding,
                Rate::IDENTITY,
                self.loan_system.fee_schedule(),
            );
        }
        let reading = oracle::read_rate(ledger, self.loan_system(), loan_id, oracle_data)?;
        cost::pay_requirement(amount, outstanding, reading.rate, self.loan_system.fee_schedule())
    }

    /// Input of `from` needed to lend `loan_id`, cosigner fee included
    #[instrument(skip_all, fields(%loan_id, %from))]
    pub fn lend_cost(
        &self,
        ledger: &Ledger,
        converter: &dyn Converter,
        from: Currency,
        cosigner: Option<&dyn Cosigner>,
        loan_id: &LoanRequestId,
        oracle_data: &[u8],
        cosigner_data: &[u8],
    ) -> Result<Amount> {
        let amounts = self.lend_amounts(ledger, cosigner, loan_id, oracle_data, cosigner_data)?;
        let cost = gateway::estimate_input(
            ledger,
            converter,
            from,
            self.accounting_currency(),
            amounts.tokens,
        )?;
        debug!(tokens = amounts.tokens, cost, "lend cost");
        Ok(cost)
    }

    /// Input of `from` needed to pay `amount` on `loan_id`, fee included
    ///
    /// Returns zero without consulting the converter when nothing is owed.
    #[instrument(skip_all, fields(%loan_id, %from, amount = amount))]
    pub fn pay_cost_with_fee(
        &self,
        ledger: &Ledger,
        converter: &dyn Converter,
        from: Currency,
        loan_id: &LoanRequestId,
        amount: Amount,
        oracle_data: &[u8],
    ) -> Result<Amount> {
        let amounts = self.pay_amounts(ledger, loan_id, amount, oracle_data)?;
        if amounts.is_noop() {
            return Ok(0);
        }
        let cost = gateway::estimate_input(
            ledger,
            converter,
            from,
            self.accounting_currency(),
            amounts.total,
        )?;
        debug!(
            effective = amounts.effective,
            total = amounts.total,
            cost,
            "pay cost"
        );
        Ok(cost)
    }

    /// `cost` plus the configured slippage margin, rounded up
    pub fn suggested_max_spend(&self, cost: Amount) -> Result<Amount> {
        cost::with_slippage(cost, self.config.slippage_bps)
    }

    /// Native value must match the budget exactly; token spends attach none
    pub(crate) fn check_payable(from: Currency, max_spend: Amount, attached: Amount) -> Result<()> {
        let expected = if from.is_native() { max_spend } else { 0 };
        if attached != expected {
            return Err(RampError::PayableMismatch {
                currency: from,
                expected,
                attached,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConverterRamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRamp")
            .field("address", &self.address)
            .field("loan_system", &self.loan_system.address())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payable_guard() {
        let token = Currency::Token(Address::from_label("token"));

        assert!(ConverterRamp::check_payable(Currency::Native, 100, 100).is_ok());
        assert!(ConverterRamp::check_payable(token, 100, 0).is_ok());

        assert!(matches!(
            ConverterRamp::check_payable(Currency::Native, 100, 0),
            Err(RampError::PayableMismatch { expected: 100, attached: 0, .. })
        ));
        assert!(matches!(
            ConverterRamp::check_payable(token, 100, 1),
            Err(RampError::PayableMismatch { expected: 0, attached: 1, .. })
        ));
    }
}
