//! Scenario model
//!
//! A scenario names tokens, converter routes, funded accounts, loans, and the
//! lend/pay steps to run. Amounts are human decimal strings ("12.5") scaled
//! by the decimals of the currency they are denominated in; loan amounts use
//! the accounting token's decimals.

use std::collections::BTreeMap;
use std::str::FromStr;

use ramp_common::{Address, Amount, Currency, Rate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Symbol reserved for the ledger's native currency
pub const NATIVE_SYMBOL: &str = "native";

/// Decimals of the native currency
pub const NATIVE_DECIMALS: u32 = 18;

/// Scenario errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("Invalid amount {0:?}")]
    InvalidAmount(String),

    #[error("Negative amount {0:?}")]
    NegativeAmount(String),

    #[error("Amount {amount:?} has more than {decimals} decimals")]
    TooPrecise { amount: String, decimals: u32 },

    #[error("Amount {0:?} does not fit in base units")]
    Overflow(String),

    #[error("Price {0:?} must be positive")]
    NonPositivePrice(String),

    #[error("Unknown currency {0:?}")]
    UnknownCurrency(String),

    #[error("Unknown loan {0:?}")]
    UnknownLoan(String),

    #[error("Route from {0:?} converts the accounting token into itself")]
    SelfRoute(String),

    #[error("Duplicate {kind} {name:?}")]
    Duplicate { kind: &'static str, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSpec {
    pub symbol: String,
    pub decimals: u32,
}

/// Converter route into the accounting token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Input currency symbol
    pub from: String,
    /// Units of `from` per accounting token
    pub price: String,
    /// Accounting tokens stocked in the converter for this route
    #[serde(default)]
    pub inventory: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSpec {
    pub name: String,
    /// Symbol to amount
    #[serde(default)]
    pub balances: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSpec {
    pub name: String,
    pub borrower: String,
    /// Principal in loan-currency units
    pub amount: String,
    /// Accounting tokens per loan-currency unit; the loan is oracle-priced
    /// when set
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendStep {
    pub loan: String,
    pub lender: String,
    pub from: String,
    /// Cosigner fee in loan-currency units; no cosigner when absent
    #[serde(default)]
    pub cosigner_cost: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayStep {
    pub loan: String,
    pub payer: String,
    pub from: String,
    /// Loan-currency units to pay
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Lend(LendStep),
    Pay(PayStep),
}

impl Step {
    pub fn action(&self) -> &'static str {
        match self {
            Step::Lend(_) => "lend",
            Step::Pay(_) => "pay",
        }
    }

    pub fn loan(&self) -> &str {
        match self {
            Step::Lend(step) => &step.loan,
            Step::Pay(step) => &step.loan,
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            Step::Lend(step) => &step.lender,
            Step::Pay(step) => &step.payer,
        }
    }

    /// Symbol the actor spends
    pub fn input(&self) -> &str {
        match self {
            Step::Lend(step) => &step.from,
            Step::Pay(step) => &step.from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Loan-system fee in basis points
    #[serde(default)]
    pub fee_bps: u32,
    pub accounting: TokenSpec,
    #[serde(default)]
    pub tokens: Vec<TokenSpec>,
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    #[serde(default)]
    pub accounts: Vec<AccountSpec>,
    #[serde(default)]
    pub loans: Vec<LoanSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            fee_bps: 0,
            accounting: TokenSpec {
                symbol: "RCN".to_string(),
                decimals: 18,
            },
            tokens: Vec::new(),
            routes: Vec::new(),
            accounts: Vec::new(),
            loans: Vec::new(),
            steps: Vec::new(),
        }
    }
}

impl Scenario {
    /// Resolve a symbol to its currency and decimals
    pub fn currency(&self, symbol: &str) -> Result<(Currency, u32), ScenarioError> {
        if symbol == NATIVE_SYMBOL {
            return Ok((Currency::Native, NATIVE_DECIMALS));
        }
        std::iter::once(&self.accounting)
            .chain(&self.tokens)
            .find(|t| t.symbol == symbol)
            .map(|t| (Currency::Token(token_address(&t.symbol)), t.decimals))
            .ok_or_else(|| ScenarioError::UnknownCurrency(symbol.to_string()))
    }

    pub fn accounting_currency(&self) -> Currency {
        Currency::Token(token_address(&self.accounting.symbol))
    }

    /// Symbol of `currency`, if the scenario declares it
    pub fn symbol_of(&self, currency: Currency) -> Option<&str> {
        match currency {
            Currency::Native => Some(NATIVE_SYMBOL),
            Currency::Token(address) => std::iter::once(&self.accounting)
                .chain(&self.tokens)
                .find(|t| token_address(&t.symbol) == address)
                .map(|t| t.symbol.as_str()),
        }
    }

    pub fn loan(&self, name: &str) -> Result<&LoanSpec, ScenarioError> {
        self.loans
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| ScenarioError::UnknownLoan(name.to_string()))
    }

    /// Check names and every amount before anything runs
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let decimals = self.accounting.decimals;
        unique("token", std::iter::once(&self.accounting).chain(&self.tokens).map(|t| &t.symbol))?;
        unique("account", self.accounts.iter().map(|a| &a.name))?;
        unique("loan", self.loans.iter().map(|l| &l.name))?;

        for route in &self.routes {
            let (from, from_decimals) = self.currency(&route.from)?;
            route_ratio(&route.price, from_decimals, decimals)?;
            if from == self.accounting_currency() {
                return Err(ScenarioError::SelfRoute(route.from.clone()));
            }
            if let Some(inventory) = &route.inventory {
                parse_units(inventory, decimals)?;
            }
        }
        for account in &self.accounts {
            for (symbol, amount) in &account.balances {
                let (_, decimals) = self.currency(symbol)?;
                parse_units(amount, decimals)?;
            }
        }
        for loan in &self.loans {
            parse_units(&loan.amount, decimals)?;
            if let Some(price) = &loan.price {
                price_to_rate(price)?;
            }
        }
        for step in &self.steps {
            self.loan(step.loan())?;
            self.currency(step.input())?;
            match step {
                Step::Lend(lend) => {
                    if let Some(cost) = &lend.cosigner_cost {
                        parse_units(cost, decimals)?;
                    }
                }
                Step::Pay(pay) => {
                    parse_units(&pay.amount, decimals)?;
                }
            }
        }
        Ok(())
    }
}

fn unique<'a>(kind: &'static str, names: impl Iterator<Item = &'a String>) -> Result<(), ScenarioError> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(ScenarioError::Duplicate {
                kind,
                name: name.clone(),
            });
        }
    }
    Ok(())
}

/// Ledger address of a token symbol
pub fn token_address(symbol: &str) -> Address {
    Address::from_label(&format!("token:{}", symbol))
}

/// Ledger address of a named account
pub fn account_address(name: &str) -> Address {
    Address::from_label(&format!("account:{}", name))
}

fn parse_decimal(text: &str) -> Result<Decimal, ScenarioError> {
    let value = Decimal::from_str(text.trim()).map_err(|_| ScenarioError::InvalidAmount(text.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ScenarioError::NegativeAmount(text.to_string()));
    }
    Ok(value.normalize())
}

fn pow10(exp: u32, text: &str) -> Result<u128, ScenarioError> {
    10u128
        .checked_pow(exp)
        .ok_or_else(|| ScenarioError::Overflow(text.to_string()))
}

/// Parse a human amount into base units of a currency with `decimals`
pub fn parse_units(text: &str, decimals: u32) -> Result<Amount, ScenarioError> {
    let value = parse_decimal(text)?;
    if value.scale() > decimals {
        return Err(ScenarioError::TooPrecise {
            amount: text.to_string(),
            decimals,
        });
    }
    let mantissa = u128::try_from(value.mantissa()).map_err(|_| ScenarioError::NegativeAmount(text.to_string()))?;
    mantissa
        .checked_mul(pow10(decimals - value.scale(), text)?)
        .ok_or_else(|| ScenarioError::Overflow(text.to_string()))
}

/// Render base units as a human amount; falls back to the raw integer when
/// the value does not fit a decimal
pub fn format_units(amount: Amount, decimals: u32) -> String {
    i128::try_from(amount)
        .ok()
        .and_then(|v| Decimal::try_from_i128_with_scale(v, decimals).ok())
        .map(|d| d.normalize().to_string())
        .unwrap_or_else(|| amount.to_string())
}

/// Oracle rate for a price of accounting tokens per loan unit
pub fn price_to_rate(price: &str) -> Result<Rate, ScenarioError> {
    let value = parse_decimal(price)?;
    if value.is_zero() {
        return Err(ScenarioError::NonPositivePrice(price.to_string()));
    }
    let tokens = u128::try_from(value.mantissa()).map_err(|_| ScenarioError::NonPositivePrice(price.to_string()))?;
    let equivalent = pow10(value.scale(), price)?;
    Rate::new(tokens, equivalent).map_err(|_| ScenarioError::NonPositivePrice(price.to_string()))
}

/// `(numerator, denominator)` of input base units per accounting base unit
/// for a route priced at `price` input units per accounting token
pub fn route_ratio(price: &str, from_decimals: u32, accounting_decimals: u32) -> Result<(u128, u128), ScenarioError> {
    let value = parse_decimal(price)?;
    if value.is_zero() {
        return Err(ScenarioError::NonPositivePrice(price.to_string()));
    }
    let mantissa = u128::try_from(value.mantissa()).map_err(|_| ScenarioError::NonPositivePrice(price.to_string()))?;
    let exponent = i64::from(from_decimals) - i64::from(value.scale()) - i64::from(accounting_decimals);
    let shift = u32::try_from(exponent.unsigned_abs()).map_err(|_| ScenarioError::Overflow(price.to_string()))?;
    if exponent >= 0 {
        let numerator = mantissa
            .checked_mul(pow10(shift, price)?)
            .ok_or_else(|| ScenarioError::Overflow(price.to_string()))?;
        Ok((numerator, 1))
    } else {
        Ok((mantissa, pow10(shift, price)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(parse_units(" 2000 ", 18).unwrap(), 2000 * 10u128.pow(18));
        assert_eq!(parse_units("1.500", 1).unwrap(), 15);
        assert_eq!(parse_units("0", 6).unwrap(), 0);
    }

    #[test]
    fn test_parse_units_rejects_bad_input() {
        assert!(matches!(parse_units("abc", 6), Err(ScenarioError::InvalidAmount(_))));
        assert!(matches!(parse_units("-1", 6), Err(ScenarioError::NegativeAmount(_))));
        assert!(matches!(
            parse_units("0.0000001", 6),
            Err(ScenarioError::TooPrecise { decimals: 6, .. })
        ));
        assert!(matches!(
            parse_units("1000000000000000000000", 18),
            Err(ScenarioError::Overflow(_))
        ));
    }

    #[test]
    fn test_format_units() {
        let formatted = format_units(1_500_000, 6);
        assert_eq!(Decimal::from_str(&formatted).unwrap(), dec!(1.5));
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(u128::MAX, 18), u128::MAX.to_string());
    }

    #[test]
    fn test_price_to_rate() {
        let rate = price_to_rate("0.5").unwrap();
        assert_eq!((rate.tokens, rate.equivalent), (5, 10));
        assert_eq!(rate.to_token(2000).unwrap(), 1000);
        assert!(matches!(price_to_rate("0"), Err(ScenarioError::NonPositivePrice(_))));
    }

    #[test]
    fn test_route_ratio_across_decimals() {
        // 0.25 USDC (6 decimals) per accounting token (18 decimals)
        let (numerator, denominator) = route_ratio("0.25", 6, 18).unwrap();
        assert_eq!((numerator, denominator), (25, 10u128.pow(14)));
        let one_token = 10u128.pow(18);
        assert_eq!(one_token * numerator / denominator, 250_000);

        // 3 units of an 18-decimal token per 6-decimal accounting token
        let (numerator, denominator) = route_ratio("3", 18, 6).unwrap();
        assert_eq!((numerator, denominator), (3 * 10u128.pow(12), 1));
    }

    #[test]
    fn test_currency_resolution() {
        let scenario = Scenario {
            tokens: vec![TokenSpec {
                symbol: "USDC".to_string(),
                decimals: 6,
            }],
            ..Scenario::default()
        };
        assert_eq!(scenario.currency("native").unwrap(), (Currency::Native, 18));
        assert_eq!(scenario.currency("USDC").unwrap().1, 6);
        assert_eq!(scenario.currency("RCN").unwrap().0, scenario.accounting_currency());
        assert!(matches!(scenario.currency("DAI"), Err(ScenarioError::UnknownCurrency(_))));
        assert_eq!(scenario.symbol_of(scenario.accounting_currency()), Some("RCN"));
    }

    #[test]
    fn test_validate_catches_unknown_loan() {
        let scenario = Scenario {
            steps: vec![Step::Pay(PayStep {
                loan: "ghost".to_string(),
                payer: "carol".to_string(),
                from: "RCN".to_string(),
                amount: "1".to_string(),
            })],
            ..Scenario::default()
        };
        assert!(matches!(scenario.validate(), Err(ScenarioError::UnknownLoan(_))));
    }

    #[test]
    fn test_validate_catches_duplicate_accounts() {
        let account = AccountSpec {
            name: "alice".to_string(),
            balances: BTreeMap::new(),
        };
        let scenario = Scenario {
            accounts: vec![account.clone(), account],
            ..Scenario::default()
        };
        assert!(matches!(
            scenario.validate(),
            Err(ScenarioError::Duplicate { kind: "account", .. })
        ));
    }
}
