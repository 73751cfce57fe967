//! Ramp configuration

use ramp_common::{RampError, Result, BPS_BASE, DEFAULT_SLIPPAGE_BPS};
use serde::{Deserialize, Serialize};

/// Settings of a [`ConverterRamp`](crate::ConverterRamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Margin added to a quote by `suggested_max_spend`, in basis points
    pub slippage_bps: u32,
    /// Fail a settlement whose final ramp balances differ from the baseline
    pub enforce_conservation: bool,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            enforce_conservation: true,
        }
    }
}

impl RampConfig {
    /// Reject settings outside their valid range
    pub fn validate(&self) -> Result<()> {
        if u128::from(self.slippage_bps) > BPS_BASE {
            return Err(RampError::Config(format!(
                "slippage_bps must be at most {}, got {}",
                BPS_BASE, self.slippage_bps
            )));
        }
        Ok(())
    }
}
