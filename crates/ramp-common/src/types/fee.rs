//! Payment fee schedule
//!
//! The loan system charges `ceil(amount × rate / base)` on top of every token
//! payment. Rounding up means integer truncation can never leave the fee
//! collector short.

use serde::{Deserialize, Serialize};

use crate::error::MathError;
use crate::math;
use crate::types::Amount;

/// Default fee denominator
pub const DEFAULT_FEE_BASE: u128 = 10_000;

/// Fee expressed as `rate / base`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rate: u128,
    pub base: u128,
}

impl FeeSchedule {
    /// No fee
    pub const NONE: FeeSchedule = FeeSchedule {
        rate: 0,
        base: DEFAULT_FEE_BASE,
    };

    pub fn new(rate: u128, base: u128) -> Self {
        Self { rate, base }
    }

    /// Fee in basis points of [`DEFAULT_FEE_BASE`]
    pub fn from_bps(bps: u128) -> Self {
        Self::new(bps, DEFAULT_FEE_BASE)
    }

    /// `ceil(amount × rate / base)`
    pub fn fee_of(&self, amount: Amount) -> Result<Amount, MathError> {
        if self.rate == 0 {
            return Ok(0);
        }
        math::mul_div_ceil(amount, self.rate, self.base)
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::NONE
    }
}
