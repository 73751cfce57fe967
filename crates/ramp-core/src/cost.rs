//! Loan cost calculator
//!
//! Computes how many accounting tokens a lend or a payment needs before any
//! conversion is quoted. Oracle conversions and fees both round up, using the
//! same `ramp-common` functions the loan system uses, so the amount forwarded
//! always covers what the loan system will collect.
//!
//! Payments are capped first, converted second, and charged the fee last.

use ramp_common::{math, Amount, FeeSchedule, Rate, Result, BPS_BASE};
use serde::{Deserialize, Serialize};

/// Token requirement of a lend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LendAmounts {
    /// Principal in loan-currency units
    pub principal: Amount,
    /// Cosigner fee in loan-currency units
    pub cosigner_cost: Amount,
    /// Accounting tokens needed for principal plus cosigner fee
    pub tokens: Amount,
}

/// Token requirement of a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayAmounts {
    /// Amount the caller asked to pay
    pub requested: Amount,
    /// Amount still owed before the payment
    pub outstanding: Amount,
    /// `min(requested, outstanding)` in loan-currency units
    pub effective: Amount,
    /// `effective` converted to accounting tokens
    pub tokens: Amount,
    /// Loan-system fee on `tokens`
    pub fee: Amount,
    /// `tokens + fee`
    pub total: Amount,
}

impl PayAmounts {
    /// Nothing left to pay (or nothing asked)
    pub fn is_noop(&self) -> bool {
        self.effective == 0
    }
}

/// `rate.to_token(principal + cosigner_cost)`
pub fn lend_requirement(principal: Amount, cosigner_cost: Amount, rate: Rate) -> Result<LendAmounts> {
    let total = math::checked_add(principal, cosigner_cost)?;
    Ok(LendAmounts {
        principal,
        cosigner_cost,
        tokens: rate.to_token(total)?,
    })
}

/// Cap at the outstanding balance, convert, then add the fee
pub fn pay_requirement(
    requested: Amount,
    outstanding: Amount,
    rate: Rate,
    fee: FeeSchedule,
) -> Result<PayAmounts> {
    let effective = requested.min(outstanding);
    if effective == 0 {
        return Ok(PayAmounts {
            requested,
            outstanding,
            effective: 0,
            tokens: 0,
            fee: 0,
            total: 0,
        });
    }

    let tokens = rate.to_token(effective)?;
    let fee_amount = fee.fee_of(tokens)?;
    Ok(PayAmounts {
        requested,
        outstanding,
        effective,
        tokens,
        fee: fee_amount,
        total: math::checked_add(tokens, fee_amount)?,
    })
}

/// `cost + ceil(cost × slippage_bps / 10_000)`
pub fn with_slippage(cost: Amount, slippage_bps: u32) -> Result<Amount> {
    let margin = math::mul_div_ceil(cost, u128::from(slippage_bps), BPS_BASE)?;
    Ok(math::checked_add(cost, margin)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use ramp_common::{MathError, RampError};

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn one_percent() -> FeeSchedule {
        FeeSchedule::from_bps(100)
    }

    #[test]
    fn test_lend_without_oracle() {
        let amounts = lend_requirement(1000, 0, Rate::IDENTITY).unwrap();
        assert_eq!(amounts.tokens, 1000);
    }

    #[test]
    fn test_lend_with_cosigner_and_oracle() {
        let rate = Rate::new(ONE, 2 * ONE).unwrap();
        let amounts = lend_requirement(1000, 1234, rate).unwrap();
        assert_eq!(amounts.tokens, (1000 + 1234) / 2);
    }

    #[test]
    fn test_lend_overflow() {
        let result = lend_requirement(u128::MAX, 1, Rate::IDENTITY);
        assert!(matches!(result, Err(RampError::Math(MathError::Overflow))));
    }

    #[test]
    fn test_pay_with_fee() {
        let amounts = pay_requirement(123, 1000, Rate::IDENTITY, one_percent()).unwrap();
        assert_eq!(amounts.tokens, 123);
        assert_eq!(amounts.fee, 2);
        assert_eq!(amounts.total, 125);
    }

    #[test]
    fn test_pay_with_oracle() {
        let rate = Rate::new(ONE, 2 * ONE).unwrap();
        let amounts = pay_requirement(100, 1000, rate, one_percent()).unwrap();
        assert_eq!(amounts.tokens, 50);
        assert_eq!(amounts.total, 51);
    }

    #[test]
    fn test_pay_capped_at_outstanding() {
        let amounts = pay_requirement(2000, 1000, Rate::IDENTITY, one_percent()).unwrap();
        assert_eq!(amounts.effective, 1000);
        assert_eq!(amounts.total, 1010);

        let rate = Rate::new(ONE, 2 * ONE).unwrap();
        let amounts = pay_requirement(10_000, 1000, rate, one_percent()).unwrap();
        assert_eq!(amounts.total, 505);
    }

    #[test]
    fn test_pay_nothing_owed() {
        let amounts = pay_requirement(1000, 0, Rate::IDENTITY, one_percent()).unwrap();
        assert!(amounts.is_noop());
        assert_eq!(amounts.total, 0);

        let amounts = pay_requirement(0, 1000, Rate::IDENTITY, one_percent()).unwrap();
        assert!(amounts.is_noop());
    }

    #[test]
    fn test_two_percent_slippage() {
        assert_eq!(with_slippage(1000, 200).unwrap(), 1020);
        assert_eq!(with_slippage(125, 200).unwrap(), 128);
        assert_eq!(with_slippage(0, 200).unwrap(), 0);
        assert_eq!(with_slippage(77, 0).unwrap(), 77);
    }

    proptest! {
        #[test]
        fn prop_pay_total_covers_fee(
            requested in 1u128..1_000_000_000,
            outstanding in 1u128..1_000_000_000,
            tokens in 1u128..1_000_000,
            equivalent in 1u128..1_000_000,
            bps in 0u128..10_000,
        ) {
            let rate = Rate::new(tokens, equivalent).unwrap();
            let fee = FeeSchedule::from_bps(bps);
            let amounts = pay_requirement(requested, outstanding, rate, fee).unwrap();

            prop_assert!(amounts.effective <= outstanding);
            prop_assert!(amounts.tokens * equivalent >= amounts.effective * tokens);
            prop_assert!(amounts.fee * 10_000 >= amounts.tokens * bps);
            prop_assert_eq!(amounts.total, amounts.tokens + amounts.fee);
        }
    }
}
