//! Oracle rates
//!
//! An oracle reports how many tokens (`tokens`) are worth `equivalent` units
//! of the loan's currency. Loan amounts are turned into token amounts with
//! `ceil(amount × tokens / equivalent)`; the loan system and the ramp both use
//! [`Rate::to_token`] so their results never drift apart.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{MathError, OracleError};
use crate::math;
use crate::types::Amount;

/// Oracle `(tokens, equivalent)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rate {
    /// Token units on the numerator side
    pub tokens: u128,
    /// Loan-currency units on the denominator side
    pub equivalent: u128,
}

impl Rate {
    /// Rate applied when a loan has no oracle
    pub const IDENTITY: Rate = Rate {
        tokens: 1,
        equivalent: 1,
    };

    /// Create a rate, rejecting zero components
    pub fn new(tokens: u128, equivalent: u128) -> Result<Self, OracleError> {
        if tokens == 0 || equivalent == 0 {
            return Err(OracleError::InvalidRate { tokens, equivalent });
        }
        Ok(Self { tokens, equivalent })
    }

    /// Convert a loan-currency amount into tokens, rounding up
    pub fn to_token(&self, amount: Amount) -> Result<Amount, MathError> {
        math::mul_div_ceil(amount, self.tokens, self.equivalent)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tokens, self.equivalent)
    }
}
