//! Shared fixture for the settlement scenarios

#![allow(dead_code)]

use std::sync::Arc;

use ramp_common::{Address, Amount, Currency, FeeSchedule, LoanRequestId, Result};
use ramp_core::{
    Converter, ConverterRamp, LendRequest, LoanLend, LoanSystem, PayRequest, RampConfig, RateOracle,
};
use ramp_ledger::Ledger;
use ramp_mocks::{FixedRateConverter, MockLoanSystem, ScriptedConverter, TestCosigner, TestRateOracle};

pub const ONE: u128 = 1_000_000_000_000_000_000;
pub const FEE_BPS: u128 = 100;

pub struct World {
    pub ledger: Ledger,
    pub ramp: Arc<ConverterRamp>,
    pub loans: Arc<MockLoanSystem>,
    pub oracle: Arc<TestRateOracle>,
    pub converter: Arc<ScriptedConverter>,
    pub cosigner: Arc<TestCosigner>,
    /// Accounting token of the loan system
    pub eng: Address,
    /// Token lenders and payers spend
    pub test_token: Address,
    pub borrower: Address,
    pub lender: Address,
    pub payer: Address,
    salt: u64,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(RampConfig::default())
    }

    pub fn with_config(config: RampConfig) -> Self {
        let eng = Address::from_label("eng-token");
        let loans = Arc::new(MockLoanSystem::new(
            Address::from_label("loan-manager"),
            eng,
            FeeSchedule::from_bps(FEE_BPS),
            Address::from_label("burner"),
        ));
        let oracle = Arc::new(TestRateOracle::new(Address::from_label("rate-oracle")));
        loans.register_oracle(oracle.clone());

        let ramp = ConverterRamp::with_config(Address::from_label("converter-ramp"), loans.clone(), config)
            .expect("valid config");

        let mut ledger = Ledger::new();
        ramp.deploy(&mut ledger);

        Self {
            ledger,
            ramp: Arc::new(ramp),
            loans,
            oracle,
            converter: Arc::new(ScriptedConverter::new(Address::from_label("test-converter"))),
            cosigner: Arc::new(TestCosigner::new(Address::from_label("test-cosigner"))),
            eng,
            test_token: Address::from_label("test-token"),
            borrower: Address::from_label("borrower"),
            lender: Address::from_label("lender"),
            payer: Address::from_label("payer"),
            salt: 0,
        }
    }

    pub fn eng(&self) -> Currency {
        Currency::Token(self.eng)
    }

    pub fn test(&self) -> Currency {
        Currency::Token(self.test_token)
    }

    /// Open a loan request, optionally priced by the test oracle
    pub fn request_loan(&mut self, amount: Amount, with_oracle: bool) -> LoanRequestId {
        self.salt += 1;
        let oracle = with_oracle.then(|| self.oracle.address());
        self.loans
            .request_loan(&mut self.ledger, self.borrower, amount, oracle, self.salt)
            .expect("loan request")
    }

    /// Fund a loan directly through the loan system, bypassing the ramp
    pub fn lend_directly(&mut self, loan_id: &LoanRequestId) {
        let direct = Address::from_label("direct-lender");
        self.ledger.mint_token(self.eng, direct, 1u128 << 100);
        self.ledger.approve(self.eng, direct, self.loans.address(), u128::MAX);

        let record = self.loans.loan(&self.ledger, loan_id).expect("loan exists");
        let oracle_data = if record.oracle.is_some() {
            TestRateOracle::encode_rate(ONE, ONE)
        } else {
            Vec::new()
        };

        let loans = self.loans.clone();
        let result: Result<()> = self.ledger.call(direct, loans.address(), 0, |ledger, ctx| {
            loans.lend(
                ledger,
                ctx,
                LoanLend {
                    loan_id,
                    oracle_data: &oracle_data,
                    cosigner: None,
                    cosigner_limit_cost: 0,
                    cosigner_data: &[],
                    callback_data: &[],
                },
            )
        });
        result.expect("direct lend");
    }

    /// Give `owner` tokens and approve the ramp to pull them
    pub fn fund_and_approve(&mut self, token: Address, owner: Address, amount: Amount) {
        self.ledger.mint_token(token, owner, amount);
        self.ledger.approve(token, owner, self.ramp.address(), amount);
    }

    pub fn lend_request(&self, from: Currency, max_spend: Amount, loan_id: LoanRequestId) -> LendRequest {
        LendRequest {
            converter: self.converter.clone(),
            from,
            max_spend,
            cosigner: None,
            cosigner_limit_cost: 0,
            loan_id,
            oracle_data: Vec::new(),
            cosigner_data: Vec::new(),
            callback_data: Vec::new(),
        }
    }

    pub fn pay_request(&self, from: Currency, pay_amount: Amount, max_spend: Amount, loan_id: LoanRequestId) -> PayRequest {
        PayRequest {
            converter: self.converter.clone(),
            from,
            pay_amount,
            max_spend,
            loan_id,
            oracle_data: Vec::new(),
        }
    }

    /// Converter quoting `from → eng` at par
    pub fn par_converter(&self, from: Currency) -> FixedRateConverter {
        FixedRateConverter::new(Address::from_label("par-amm")).with_rate(from, self.eng(), 1, 1)
    }

    pub fn ramp_balance(&self, currency: Currency) -> Amount {
        self.ledger.balance(currency, self.ramp.address())
    }

    /// The ramp holds nothing and has no standing allowances
    pub fn assert_ramp_clean(&self) {
        let ramp = self.ramp.address();
        assert_eq!(self.ramp_balance(self.eng()), 0, "ramp kept accounting tokens");
        assert_eq!(self.ramp_balance(self.test()), 0, "ramp kept input tokens");
        assert_eq!(self.ramp_balance(Currency::Native), 0, "ramp kept native");
        assert_eq!(self.ledger.allowance(self.test_token, ramp, self.converter.address()), 0);
        assert_eq!(self.ledger.allowance(self.eng, ramp, self.loans.address()), 0);
    }
}

/// `amount` plus the 1% loan-system fee, rounded up
pub fn with_fee(amount: Amount) -> Amount {
    let fee = amount * FEE_BPS;
    amount + fee / 10_000 + u128::from(fee % 10_000 != 0)
}
