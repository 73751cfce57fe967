//! Test rate oracle
//!
//! Oracle data is 64 bytes: `tokens` then `equivalent`, each a 32-byte
//! big-endian word.

use ramp_common::{Address, OracleError, Rate, Result};
use ramp_core::RateOracle;

const WORD: usize = 32;

/// Oracle that decodes whatever rate the caller encoded
#[derive(Debug, Clone)]
pub struct TestRateOracle {
    address: Address,
}

impl TestRateOracle {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Encode a rate as oracle data
    pub fn encode_rate(tokens: u128, equivalent: u128) -> Vec<u8> {
        let mut data = vec![0u8; 2 * WORD];
        data[WORD - 16..WORD].copy_from_slice(&tokens.to_be_bytes());
        data[2 * WORD - 16..].copy_from_slice(&equivalent.to_be_bytes());
        data
    }

    fn word(bytes: &[u8]) -> std::result::Result<u128, OracleError> {
        if bytes[..WORD - 16].iter().any(|b| *b != 0) {
            return Err(OracleError::MalformedData(
                "rate component exceeds 128 bits".to_string(),
            ));
        }
        let mut low = [0u8; 16];
        low.copy_from_slice(&bytes[WORD - 16..WORD]);
        Ok(u128::from_be_bytes(low))
    }
}

impl RateOracle for TestRateOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn decode_rate(&self, oracle_data: &[u8]) -> Result<Rate> {
        if oracle_data.len() != 2 * WORD {
            return Err(OracleError::MalformedData(format!(
                "expected {} bytes, got {}",
                2 * WORD,
                oracle_data.len()
            ))
            .into());
        }
        let tokens = Self::word(&oracle_data[..WORD])?;
        let equivalent = Self::word(&oracle_data[WORD..])?;
        Ok(Rate::new(tokens, equivalent)?)
    }
}
