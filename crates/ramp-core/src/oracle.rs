//! Oracle relay
//!
//! Resolves the rate a loan's oracle reports for caller-supplied oracle data.
//! The raw bytes are forwarded unchanged to the loan system, which decodes
//! them again, so both sides settle at the same rate.

use std::fmt;

use ramp_common::{Address, LoanRequestId, Rate, Result};
use ramp_ledger::Ledger;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::capability::LoanSystem;

/// Name of the event recorded whenever a rate is read during settlement
pub const ORACLE_READ_EVENT: &str = "oracle_read";

/// Rate in effect for one settlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleReading {
    /// Oracle consulted; `None` when the loan is denominated in its token
    pub oracle: Option<Address>,
    pub rate: Rate,
}

impl OracleReading {
    /// Reading for a loan without an oracle
    pub const IDENTITY: OracleReading = OracleReading {
        oracle: None,
        rate: Rate::IDENTITY,
    };
}

impl fmt::Display for OracleReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.oracle {
            Some(oracle) => write!(f, "{} via {}", self.rate, oracle),
            None => write!(f, "{} (no oracle)", self.rate),
        }
    }
}

/// Decode the loan's rate without side effects
pub fn read_rate(
    ledger: &Ledger,
    loan_system: &dyn LoanSystem,
    loan_id: &LoanRequestId,
    oracle_data: &[u8],
) -> Result<OracleReading> {
    let Some(oracle) = loan_system.oracle(ledger, loan_id)? else {
        return Ok(OracleReading::IDENTITY);
    };
    let decoded = oracle.decode_rate(oracle_data)?;
    // Decoded components must be non-zero
    let rate = Rate::new(decoded.tokens, decoded.equivalent)?;
    Ok(OracleReading {
        oracle: Some(oracle.address()),
        rate,
    })
}

/// Read the rate for settlement and record it as an event from `emitter`
pub fn relay(
    ledger: &mut Ledger,
    emitter: Address,
    loan_system: &dyn LoanSystem,
    loan_id: &LoanRequestId,
    oracle_data: &[u8],
) -> Result<OracleReading> {
    let reading = read_rate(ledger, loan_system, loan_id, oracle_data)?;
    if let Some(oracle) = reading.oracle {
        ledger.emit(
            emitter,
            ORACLE_READ_EVENT,
            json!({
                "oracle": oracle.to_hex(),
                "tokens": reading.rate.tokens.to_string(),
                "equivalent": reading.rate.equivalent.to_string(),
            }),
        );
    }
    debug!(%loan_id, reading = %reading, "oracle relayed");
    Ok(reading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ramp_common::{Amount, FeeSchedule, OracleError, RampError};
    use ramp_ledger::CallContext;

    use crate::capability::{LoanLend, RateOracle};

    /// Oracle whose "data" is two ASCII numbers separated by '/'
    struct SlashOracle;

    impl RateOracle for SlashOracle {
        fn address(&self) -> Address {
            Address::from_label("slash-oracle")
        }

        fn decode_rate(&self, oracle_data: &[u8]) -> Result<Rate> {
            let text = std::str::from_utf8(oracle_data)
                .map_err(|e| OracleError::MalformedData(e.to_string()))?;
            let (tokens, equivalent) = text
                .split_once('/')
                .ok_or_else(|| OracleError::MalformedData(text.to_string()))?;
            let parse = |s: &str| {
                s.parse::<u128>()
                    .map_err(|e| OracleError::MalformedData(e.to_string()))
            };
            Ok(Rate {
                tokens: parse(tokens)?,
                equivalent: parse(equivalent)?,
            })
        }
    }

    /// Loan system that only answers oracle lookups
    struct OracleOnly(Option<Arc<dyn RateOracle>>);

    impl LoanSystem for OracleOnly {
        fn address(&self) -> Address {
            Address::from_label("loans")
        }
        fn token(&self) -> Address {
            Address::from_label("token")
        }
        fn fee_schedule(&self) -> FeeSchedule {
            FeeSchedule::NONE
        }
        fn requested_amount(&self, _: &Ledger, _: &LoanRequestId) -> Result<Amount> {
            Ok(0)
        }
        fn outstanding_balance(&self, _: &Ledger, _: &LoanRequestId) -> Result<Amount> {
            Ok(0)
        }
        fn oracle(&self, _: &Ledger, _: &LoanRequestId) -> Result<Option<Arc<dyn RateOracle>>> {
            Ok(self.0.clone())
        }
        fn lend(&self, _: &mut Ledger, _: CallContext, _: LoanLend<'_>) -> Result<()> {
            unimplemented!()
        }
        fn pay_from(
            &self,
            _: &mut Ledger,
            _: CallContext,
            _: Address,
            _: &LoanRequestId,
            _: Amount,
            _: &[u8],
        ) -> Result<Amount> {
            unimplemented!()
        }
        fn transfer_debt(&self, _: &mut Ledger, _: CallContext, _: &LoanRequestId, _: Address) -> Result<()> {
            unimplemented!()
        }
    }

    fn loan_id() -> LoanRequestId {
        LoanRequestId::derive(&[b"loan"])
    }

    #[test]
    fn test_no_oracle_is_identity() {
        let ledger = Ledger::new();
        let reading = read_rate(&ledger, &OracleOnly(None), &loan_id(), b"ignored").unwrap();
        assert_eq!(reading, OracleReading::IDENTITY);
    }

    #[test]
    fn test_relay_emits_event() {
        let mut ledger = Ledger::new();
        let ramp = Address::from_label("ramp");
        let loans = OracleOnly(Some(Arc::new(SlashOracle)));

        let reading = relay(&mut ledger, ramp, &loans, &loan_id(), b"1/2").unwrap();
        assert_eq!(reading.rate, Rate::new(1, 2).unwrap());

        let events: Vec<_> = ledger.events_named(ORACLE_READ_EVENT).collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].emitter, ramp);
        assert_eq!(events[0].attribute("tokens"), Some("1"));
        assert_eq!(events[0].attribute("equivalent"), Some("2"));
    }

    #[test]
    fn test_relay_without_oracle_is_silent() {
        let mut ledger = Ledger::new();
        relay(&mut ledger, Address::from_label("ramp"), &OracleOnly(None), &loan_id(), &[]).unwrap();
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_malformed_data() {
        let ledger = Ledger::new();
        let loans = OracleOnly(Some(Arc::new(SlashOracle)));
        let result = read_rate(&ledger, &loans, &loan_id(), b"garbage");
        assert!(matches!(
            result,
            Err(RampError::Oracle(OracleError::MalformedData(_)))
        ));
    }

    #[test]
    fn test_zero_rate_rejected() {
        let ledger = Ledger::new();
        let loans = OracleOnly(Some(Arc::new(SlashOracle)));
        let result = read_rate(&ledger, &loans, &loan_id(), b"0/5");
        assert!(matches!(
            result,
            Err(RampError::Oracle(OracleError::InvalidRate { tokens: 0, .. }))
        ));
    }
}
