//! Checked rounding arithmetic
//!
//! Every monetary computation in the ramp is a multiply-then-divide. The
//! product is computed on a 256-bit intermediate so it cannot overflow; only
//! the final quotient has to fit back into an [`Amount`].
//!
//! Fees, oracle conversions, converter quotes, and slippage margins all round
//! **up**, so integer truncation never leaves the receiving side short.

use bnum::types::U256;

use crate::error::MathError;
use crate::types::Amount;

/// `ceil(value × numerator / denominator)`
pub fn mul_div_ceil(
    value: Amount,
    numerator: Amount,
    denominator: Amount,
) -> Result<Amount, MathError> {
    let (quotient, has_remainder) = full_mul_div(value, numerator, denominator)?;
    let quotient = narrow(quotient)?;
    if has_remainder {
        quotient.checked_add(1).ok_or(MathError::Overflow)
    } else {
        Ok(quotient)
    }
}

/// Checked addition for amounts
#[inline]
pub fn checked_add(a: Amount, b: Amount) -> Result<Amount, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

fn full_mul_div(
    value: Amount,
    numerator: Amount,
    denominator: Amount,
) -> Result<(U256, bool), MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(value) * U256::from(numerator);
    let denominator = U256::from(denominator);
    let quotient = product / denominator;
    let remainder = product % denominator;
    Ok((quotient, remainder != U256::ZERO))
}

fn narrow(value: U256) -> Result<Amount, MathError> {
    let digits = value.digits();
    if digits[2] != 0 || digits[3] != 0 {
        return Err(MathError::Overflow);
    }
    Ok((digits[0] as u128) | ((digits[1] as u128) << 64))
}
