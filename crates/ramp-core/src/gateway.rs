//! Conversion gateway
//!
//! Stateless adapter over an external [`Converter`]. The gateway grants the
//! converter exactly the input it may take, for exactly the duration of the
//! conversion, and judges the outcome by the holder's own balance deltas
//! rather than by what the converter reports. An allowance the holder already
//! had standing (an interrupted outer conversion) is put back afterwards.

use ramp_common::{Address, Amount, ConversionError, Currency, Result};
use ramp_ledger::Ledger;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::capability::Converter;
use crate::currency::balance_of;

/// One exact-output conversion
#[derive(Clone, Copy)]
pub struct ConversionIntent<'a> {
    pub converter: &'a dyn Converter,
    pub from: Currency,
    pub to: Currency,
    pub exact_output: Amount,
    pub max_input: Amount,
}

/// Measured result of a conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Input that left the holder
    pub spent: Amount,
    /// Output that reached the holder
    pub received: Amount,
    /// Spend the converter claimed
    pub reported: Amount,
}

/// Input of `from` needed to obtain `exact_output` of `to`
pub fn estimate_input(
    ledger: &Ledger,
    converter: &dyn Converter,
    from: Currency,
    to: Currency,
    exact_output: Amount,
) -> Result<Amount> {
    if exact_output == 0 {
        return Ok(0);
    }
    if from == to {
        return Ok(exact_output);
    }
    converter.estimate_input(ledger, from, to, exact_output)
}

/// Convert on behalf of `holder`, spending at most `intent.max_input`
#[instrument(skip_all, fields(from = %intent.from, to = %intent.to, exact_output = intent.exact_output, max_input = intent.max_input))]
pub fn convert_exact(
    ledger: &mut Ledger,
    holder: Address,
    intent: &ConversionIntent<'_>,
) -> Result<ConversionOutcome> {
    if intent.exact_output == 0 {
        return Ok(ConversionOutcome::default());
    }
    if intent.from == intent.to {
        if intent.exact_output > intent.max_input {
            return Err(ConversionError::SpentAboveMax {
                spent: intent.exact_output,
                max_input: intent.max_input,
            }
            .into());
        }
        return Ok(ConversionOutcome {
            spent: intent.exact_output,
            received: intent.exact_output,
            reported: intent.exact_output,
        });
    }

    let converter = intent.converter;
    let target = converter.address();

    // A rejected outcome must also undo whatever the converter already moved
    ledger.atomic(|ledger| {
        let input_before = balance_of(ledger, intent.from, holder);
        let output_before = balance_of(ledger, intent.to, holder);

        let (value, outer) = match intent.from {
            Currency::Native => (intent.max_input, 0),
            Currency::Token(token) => {
                let outer = ledger.allowance(token, holder, target);
                ledger.approve(token, holder, target, intent.max_input);
                (0, outer)
            }
        };

        let result = ledger.call(holder, target, value, |ledger, ctx| {
            converter.convert_exact(
                ledger,
                ctx,
                intent.from,
                intent.to,
                intent.exact_output,
                intent.max_input,
            )
        });

        // No allowance outlives the conversion
        if let Currency::Token(token) = intent.from {
            ledger.approve(token, holder, target, outer);
        }
        let reported = result?;

        let spent = input_before.saturating_sub(balance_of(ledger, intent.from, holder));
        let received = balance_of(ledger, intent.to, holder).saturating_sub(output_before);
        debug!(spent, received, reported, "conversion measured");

        if reported != spent {
            warn!(
                converter = %target,
                reported,
                spent,
                "converter misreported its spend"
            );
        }
        if received < intent.exact_output {
            return Err(ConversionError::OutputShortfall {
                expected: intent.exact_output,
                received,
            }
            .into());
        }
        if spent > intent.max_input {
            return Err(ConversionError::SpentAboveMax {
                spent,
                max_input: intent.max_input,
            }
            .into());
        }

        Ok(ConversionOutcome {
            spent,
            received,
            reported,
        })
    })
}
