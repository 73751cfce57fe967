//! Scenario runner
//!
//! Builds a fresh ledger with the reference mocks, funds the declared
//! accounts, opens the loans, then runs each step: quote, add the slippage
//! margin, approve, settle. A failed step is reported and the run continues;
//! the failed settlement leaves no trace on the ledger.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use ramp_common::{Address, Amount, Currency, FeeSchedule, LoanRequestId};
use ramp_core::{Converter, ConverterRamp, Cosigner, LendRequest, PayRequest, RateOracle, SettlementReceipt};
use ramp_ledger::Ledger;
use ramp_mocks::{FixedRateConverter, MockLoanSystem, TestCosigner, TestRateOracle};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::SimConfig;
use crate::scenario::{
    account_address, format_units, parse_units, price_to_rate, route_ratio, LendStep, PayStep, Scenario, Step,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Settled { receipt: SettlementReceipt },
    Rejected { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub action: &'static str,
    pub loan: String,
    pub actor: String,
    pub from: String,
    /// Quoted input, before the slippage margin
    pub quoted: Option<String>,
    pub max_spend: Option<String>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn is_settled(&self) -> bool {
        matches!(self.outcome, StepOutcome::Settled { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub steps: Vec<StepReport>,
    /// Account name to symbol to human amount, non-zero only
    pub balances: BTreeMap<String, BTreeMap<String, String>>,
    /// The ramp holds nothing after the run
    pub ramp_clean: bool,
}

/// Quote and budget of one step
struct Budget {
    quoted: Amount,
    max_spend: Amount,
}

pub struct Simulation {
    scenario: Scenario,
    ledger: Ledger,
    ramp: Arc<ConverterRamp>,
    converter: Arc<FixedRateConverter>,
    cosigner: Arc<TestCosigner>,
    loans: HashMap<String, LoanRequestId>,
    oracle_data: HashMap<String, Vec<u8>>,
}

impl Simulation {
    /// Set up the world described by `config`
    #[instrument(skip_all, fields(loans = config.scenario.loans.len(), steps = config.scenario.steps.len()))]
    pub fn build(config: &SimConfig) -> Result<Self> {
        let scenario = config.scenario.clone();
        let accounting = scenario.accounting_currency();
        let accounting_token = accounting
            .token()
            .context("accounting currency must be a token")?;
        let decimals = scenario.accounting.decimals;

        let loan_system = Arc::new(MockLoanSystem::new(
            Address::from_label("loan-system"),
            accounting_token,
            FeeSchedule::from_bps(u128::from(scenario.fee_bps)),
            account_address("fee-collector"),
        ));
        let oracle = Arc::new(TestRateOracle::new(Address::from_label("oracle")));
        loan_system.register_oracle(oracle.clone());
        let ramp = Arc::new(ConverterRamp::with_config(
            Address::from_label("converter-ramp"),
            loan_system.clone(),
            config.ramp.clone(),
        )?);
        let converter = Arc::new(FixedRateConverter::new(Address::from_label("converter")));
        let cosigner = Arc::new(TestCosigner::new(Address::from_label("cosigner")));

        let mut ledger = Ledger::new();
        ramp.deploy(&mut ledger);
        for route in &scenario.routes {
            let (from, from_decimals) = scenario.currency(&route.from)?;
            let (numerator, denominator) = route_ratio(&route.price, from_decimals, decimals)?;
            converter.set_rate(from, accounting, numerator, denominator);
            if let Some(inventory) = &route.inventory {
                ledger.mint_token(accounting_token, converter.address(), parse_units(inventory, decimals)?);
            }
            debug!(from = %route.from, numerator, denominator, "route");
        }

        for account in &scenario.accounts {
            let address = account_address(&account.name);
            for (symbol, amount) in &account.balances {
                let (currency, decimals) = scenario.currency(symbol)?;
                let amount = parse_units(amount, decimals)?;
                match currency {
                    Currency::Native => ledger.mint_native(address, amount),
                    Currency::Token(token) => ledger.mint_token(token, address, amount),
                }
            }
        }

        let mut loans = HashMap::new();
        let mut oracle_data = HashMap::new();
        for (salt, loan) in (1u64..).zip(&scenario.loans) {
            let oracle_address = loan.price.as_ref().map(|_| oracle.address());
            let id = loan_system.request_loan(
                &mut ledger,
                account_address(&loan.borrower),
                parse_units(&loan.amount, decimals)?,
                oracle_address,
                salt,
            )?;
            if let Some(price) = &loan.price {
                let rate = price_to_rate(price)?;
                oracle_data.insert(loan.name.clone(), TestRateOracle::encode_rate(rate.tokens, rate.equivalent));
            }
            debug!(loan = %loan.name, loan_id = %id, "loan opened");
            loans.insert(loan.name.clone(), id);
        }

        Ok(Self {
            scenario,
            ledger,
            ramp,
            converter,
            cosigner,
            loans,
            oracle_data,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ramp(&self) -> &ConverterRamp {
        &self.ramp
    }

    pub fn loan_id(&self, name: &str) -> Option<LoanRequestId> {
        self.loans.get(name).copied()
    }

    /// Run every step in order
    pub fn run(&mut self) -> Result<SimulationReport> {
        let steps = self.scenario.steps.clone();
        let mut reports = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let report = self.run_step(index, step)?;
            reports.push(report);
        }
        let settled = reports.iter().filter(|r| r.is_settled()).count();
        info!(steps = reports.len(), settled, "scenario complete");

        Ok(SimulationReport {
            steps: reports,
            balances: self.balances(),
            ramp_clean: self.ramp_is_clean(),
        })
    }

    #[instrument(skip_all, fields(index = index, action = step.action(), loan = step.loan(), actor = step.actor()))]
    fn run_step(&mut self, index: usize, step: &Step) -> Result<StepReport> {
        let (input, input_decimals) = self.scenario.currency(step.input())?;
        let actor = account_address(step.actor());
        let loan_id = self
            .loan_id(step.loan())
            .with_context(|| format!("loan {} was never opened", step.loan()))?;

        let mut budget = None;
        let result = match step {
            Step::Lend(lend) => self.lend(lend, input, actor, loan_id, &mut budget),
            Step::Pay(pay) => self.pay(pay, input, actor, loan_id, &mut budget),
        };

        let outcome = match result {
            Ok(receipt) => StepOutcome::Settled { receipt },
            Err(e) => {
                warn!(error = %e, "step rejected");
                StepOutcome::Rejected { error: e.to_string() }
            }
        };
        Ok(StepReport {
            index,
            action: step.action(),
            loan: step.loan().to_string(),
            actor: step.actor().to_string(),
            from: step.input().to_string(),
            quoted: budget
                .as_ref()
                .map(|b: &Budget| format_units(b.quoted, input_decimals)),
            max_spend: budget.as_ref().map(|b| format_units(b.max_spend, input_decimals)),
            outcome,
        })
    }

    fn lend(
        &mut self,
        step: &LendStep,
        input: Currency,
        actor: Address,
        loan_id: LoanRequestId,
        budget: &mut Option<Budget>,
    ) -> ramp_common::Result<SettlementReceipt> {
        let decimals = self.scenario.accounting.decimals;
        let cosigner: Option<Arc<dyn Cosigner>> = match &step.cosigner_cost {
            Some(cost) => {
                let cost = parse_units(cost, decimals).map_err(|e| ramp_common::RampError::Config(e.to_string()))?;
                self.cosigner.set_cost(loan_id, cost);
                Some(self.cosigner.clone())
            }
            None => None,
        };
        let cosigner_limit_cost = match &cosigner {
            Some(c) => c.request_cost(&self.ledger, &loan_id, &[])?,
            None => 0,
        };
        let oracle_data = self.oracle_data.get(&step.loan).cloned().unwrap_or_default();

        let quoted = self.ramp.lend_cost(
            &self.ledger,
            self.converter.as_ref(),
            input,
            cosigner.as_deref(),
            &loan_id,
            &oracle_data,
            &[],
        )?;
        let max_spend = self.authorize(input, actor, quoted)?;
        *budget = Some(Budget { quoted, max_spend });

        let request = LendRequest {
            converter: self.converter.clone(),
            from: input,
            max_spend,
            cosigner,
            cosigner_limit_cost,
            loan_id,
            oracle_data,
            cosigner_data: Vec::new(),
            callback_data: Vec::new(),
        };
        let value = if input.is_native() { max_spend } else { 0 };
        self.ramp.lend(&mut self.ledger, actor, value, &request)
    }

    fn pay(
        &mut self,
        step: &PayStep,
        input: Currency,
        actor: Address,
        loan_id: LoanRequestId,
        budget: &mut Option<Budget>,
    ) -> ramp_common::Result<SettlementReceipt> {
        let decimals = self.scenario.accounting.decimals;
        let amount =
            parse_units(&step.amount, decimals).map_err(|e| ramp_common::RampError::Config(e.to_string()))?;
        let oracle_data = self.oracle_data.get(&step.loan).cloned().unwrap_or_default();

        let quoted = self.ramp.pay_cost_with_fee(
            &self.ledger,
            self.converter.as_ref(),
            input,
            &loan_id,
            amount,
            &oracle_data,
        )?;
        let max_spend = self.authorize(input, actor, quoted)?;
        *budget = Some(Budget { quoted, max_spend });

        let request = PayRequest {
            converter: self.converter.clone(),
            from: input,
            pay_amount: amount,
            max_spend,
            loan_id,
            oracle_data,
        };
        let value = if input.is_native() { max_spend } else { 0 };
        self.ramp.pay(&mut self.ledger, actor, value, &request)
    }

    /// Add the slippage margin and let the ramp pull that much from `actor`
    fn authorize(&mut self, input: Currency, actor: Address, quoted: Amount) -> ramp_common::Result<Amount> {
        let max_spend = self.ramp.suggested_max_spend(quoted)?;
        if let Currency::Token(token) = input {
            self.ledger.approve(token, actor, self.ramp.address(), max_spend);
        }
        debug!(quoted, max_spend, "authorized");
        Ok(max_spend)
    }

    fn balances(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        let mut names: Vec<String> = self.scenario.accounts.iter().map(|a| a.name.clone()).collect();
        for loan in &self.scenario.loans {
            names.push(loan.borrower.clone());
        }
        names.push("fee-collector".to_string());
        names.sort();
        names.dedup();

        let mut currencies = vec!["native".to_string(), self.scenario.accounting.symbol.clone()];
        currencies.extend(self.scenario.tokens.iter().map(|t| t.symbol.clone()));

        let mut out = BTreeMap::new();
        for name in names {
            let address = account_address(&name);
            let mut held = BTreeMap::new();
            for symbol in &currencies {
                if let Ok((currency, decimals)) = self.scenario.currency(symbol) {
                    let amount = self.ledger.balance(currency, address);
                    if amount > 0 {
                        held.insert(symbol.clone(), format_units(amount, decimals));
                    }
                }
            }
            out.insert(name, held);
        }
        out
    }

    fn ramp_is_clean(&self) -> bool {
        let ramp = self.ramp.address();
        let mut currencies = vec![Currency::Native, self.scenario.accounting_currency()];
        currencies.extend(
            self.scenario
                .tokens
                .iter()
                .filter_map(|t| self.scenario.currency(&t.symbol).ok())
                .map(|(c, _)| c),
        );
        currencies.iter().all(|c| self.ledger.balance(*c, ramp) == 0)
    }
}

/// Build and run `config` in one go
pub fn simulate(config: &SimConfig) -> Result<SimulationReport> {
    let mut simulation = Simulation::build(config)?;
    simulation.run()
}
