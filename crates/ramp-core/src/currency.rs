//! Currency abstraction
//!
//! Uniform pull / push / balance over native currency and tokens:
//! - native value arrives attached to the call and leaves with a plain send
//! - tokens arrive through an allowance-backed `transfer_from` and leave with
//!   a plain `transfer`

use ramp_common::{Address, Amount, Currency, CurrencyError, Result};
use ramp_ledger::{CallContext, Ledger};
use tracing::debug;

/// Collect exactly `amount` of `currency` from the caller into the callee.
///
/// Native currency must already be attached as `ctx.value` (the host moved
/// it when the call opened), and must match `amount` exactly. Token pulls
/// refuse any attached value.
pub fn pull(ledger: &mut Ledger, ctx: CallContext, currency: Currency, amount: Amount) -> Result<()> {
    match currency {
        Currency::Native => {
            if ctx.value != amount {
                return Err(CurrencyError::InvalidTransferMode {
                    currency,
                    attached: ctx.value,
                    amount,
                }
                .into());
            }
        }
        Currency::Token(token) => {
            if ctx.value != 0 {
                return Err(CurrencyError::InvalidTransferMode {
                    currency,
                    attached: ctx.value,
                    amount,
                }
                .into());
            }
            ledger
                .transfer_from(token, ctx.target, ctx.caller, ctx.target, amount)
                .map_err(|source| CurrencyError::TransferFailed {
                    currency,
                    payer: ctx.caller,
                    amount,
                    source,
                })?;
        }
    }
    debug!(%currency, payer = %ctx.caller, amount, "pulled");
    Ok(())
}

/// Send `amount` of `currency` from `holder` to `recipient`; zero is a no-op
pub fn push(
    ledger: &mut Ledger,
    holder: Address,
    currency: Currency,
    recipient: Address,
    amount: Amount,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    match currency {
        Currency::Native => ledger
            .send_native(holder, recipient, amount)
            .map_err(|source| CurrencyError::NativeTransferFailed {
                recipient,
                amount,
                source,
            })?,
        Currency::Token(token) => ledger
            .transfer(token, holder, recipient, amount)
            .map_err(|source| CurrencyError::TokenTransferFailed {
                token,
                recipient,
                amount,
                source,
            })?,
    }
    debug!(%currency, %recipient, amount, "pushed");
    Ok(())
}

#[inline]
pub fn balance_of(ledger: &Ledger, currency: Currency, holder: Address) -> Amount {
    ledger.balance(currency, holder)
}
