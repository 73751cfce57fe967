//! Test converters
//!
//! - [`FixedRateConverter`]: quotes and fills at configured rates out of its
//!   own inventory
//! - [`ScriptedConverter`]: spends, delivers, and reports exactly what it is
//!   told to, regardless of the request

use std::collections::HashMap;

use parking_lot::{Mutex, RwLock};
use ramp_common::{math, Address, Amount, ConversionError, Currency, Result};
use ramp_core::Converter;
use ramp_ledger::{CallContext, Ledger};
use tracing::debug;

/// Take `input` of `from` from the caller; native change goes back
pub(crate) fn collect_input(
    ledger: &mut Ledger,
    ctx: CallContext,
    from: Currency,
    input: Amount,
) -> Result<()> {
    match from {
        Currency::Native => {
            if ctx.value < input {
                return Err(ConversionError::Failed(format!(
                    "attached {} native, need {}",
                    ctx.value, input
                ))
                .into());
            }
            ledger.send_native(ctx.target, ctx.caller, ctx.value - input)?;
        }
        Currency::Token(token) => {
            ledger.transfer_from(token, ctx.target, ctx.caller, ctx.target, input)?;
        }
    }
    Ok(())
}

/// Send `amount` of `to` from the converter's inventory to the caller
pub(crate) fn deliver_output(ledger: &mut Ledger, ctx: CallContext, to: Currency, amount: Amount) -> Result<()> {
    match to {
        Currency::Native => ledger.send_native(ctx.target, ctx.caller, amount)?,
        Currency::Token(token) => ledger.transfer(token, ctx.target, ctx.caller, amount)?,
    }
    Ok(())
}

/// Converter charging `ceil(output × numerator / denominator)` input
#[derive(Debug)]
pub struct FixedRateConverter {
    address: Address,
    rates: RwLock<HashMap<(Currency, Currency), (u128, u128)>>,
}

impl FixedRateConverter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Price one unit of `to` at `numerator / denominator` units of `from`
    pub fn set_rate(&self, from: Currency, to: Currency, numerator: u128, denominator: u128) {
        self.rates.write().insert((from, to), (numerator, denominator));
    }

    /// Builder form of [`set_rate`](Self::set_rate)
    pub fn with_rate(self, from: Currency, to: Currency, numerator: u128, denominator: u128) -> Self {
        self.set_rate(from, to, numerator, denominator);
        self
    }

    fn quote(&self, from: Currency, to: Currency, exact_output: Amount) -> Result<Amount> {
        let (numerator, denominator) = self
            .rates
            .read()
            .get(&(from, to))
            .copied()
            .ok_or(ConversionError::NoRoute { from, to })?;
        Ok(math::mul_div_ceil(exact_output, numerator, denominator)?)
    }
}

impl Converter for FixedRateConverter {
    fn address(&self) -> Address {
        self.address
    }

    fn estimate_input(&self, _ledger: &Ledger, from: Currency, to: Currency, exact_output: Amount) -> Result<Amount> {
        self.quote(from, to, exact_output)
    }

    fn convert_exact(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        from: Currency,
        to: Currency,
        exact_output: Amount,
        max_input: Amount,
    ) -> Result<Amount> {
        let input = self.quote(from, to, exact_output)?;
        if input > max_input {
            return Err(ConversionError::SpentAboveMax {
                spent: input,
                max_input,
            }
            .into());
        }
        collect_input(ledger, ctx, from, input)?;
        deliver_output(ledger, ctx, to, exact_output)?;
        debug!(%from, %to, input, output = exact_output, "filled");
        Ok(input)
    }
}

/// What a [`ScriptedConverter`] does on its next conversions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Script {
    /// Input taken from the caller
    pub spend: Amount,
    /// Output handed to the caller
    pub deliver: Amount,
    /// Spend reported back; defaults to `spend`
    pub report: Option<Amount>,
    /// Quote returned by `estimate_input`; defaults to `spend`
    pub quote: Option<Amount>,
}

/// Converter whose behavior is set by the test
#[derive(Debug)]
pub struct ScriptedConverter {
    address: Address,
    script: Mutex<Script>,
}

impl ScriptedConverter {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            script: Mutex::new(Script::default()),
        }
    }

    /// Spend `spend` and deliver `deliver` on every conversion
    pub fn set_custom_data(&self, spend: Amount, deliver: Amount) {
        *self.script.lock() = Script {
            spend,
            deliver,
            ..Script::default()
        };
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock() = script;
    }
}

impl Converter for ScriptedConverter {
    fn address(&self) -> Address {
        self.address
    }

    fn estimate_input(&self, _ledger: &Ledger, _from: Currency, _to: Currency, _exact_output: Amount) -> Result<Amount> {
        let script = *self.script.lock();
        Ok(script.quote.unwrap_or(script.spend))
    }

    fn convert_exact(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        from: Currency,
        to: Currency,
        _exact_output: Amount,
        _max_input: Amount,
    ) -> Result<Amount> {
        let script = *self.script.lock();
        collect_input(ledger, ctx, from, script.spend)?;
        deliver_output(ledger, ctx, to, script.deliver)?;
        Ok(script.report.unwrap_or(script.spend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_rate_quote_rounds_up() {
        let input = Currency::Token(Address::from_label("input"));
        let output = Currency::Token(Address::from_label("output"));
        let converter = FixedRateConverter::new(Address::from_label("amm")).with_rate(input, output, 3, 2);
        let ledger = Ledger::new();

        assert_eq!(converter.estimate_input(&ledger, input, output, 1000).unwrap(), 1500);
        assert_eq!(converter.estimate_input(&ledger, input, output, 1001).unwrap(), 1502);
    }

    #[test]
    fn test_unknown_pair_has_no_route() {
        let input = Currency::Token(Address::from_label("input"));
        let converter = FixedRateConverter::new(Address::from_label("amm"));
        let ledger = Ledger::new();

        let result = converter.estimate_input(&ledger, input, Currency::Native, 1);
        assert!(matches!(
            result,
            Err(ramp_common::RampError::Conversion(ConversionError::NoRoute { .. }))
        ));
    }

    #[test]
    fn test_fill_from_inventory() {
        let input = Address::from_label("input");
        let output = Address::from_label("output");
        let holder = Address::from_label("holder");
        let converter = FixedRateConverter::new(Address::from_label("amm")).with_rate(
            Currency::Token(input),
            Currency::Token(output),
            2,
            1,
        );
        let mut ledger = Ledger::new();
        ledger.mint_token(input, holder, 500);
        ledger.mint_token(output, converter.address(), 500);
        ledger.approve(input, holder, converter.address(), 500);

        let spent: Result<Amount> = ledger.call(holder, converter.address(), 0, |ledger, ctx| {
            converter.convert_exact(
                ledger,
                ctx,
                Currency::Token(input),
                Currency::Token(output),
                100,
                500,
            )
        });

        assert_eq!(spent.unwrap(), 200);
        assert_eq!(ledger.token_balance(output, holder), 100);
        assert_eq!(ledger.token_balance(input, converter.address()), 200);
    }
}
