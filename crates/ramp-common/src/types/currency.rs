//! Currency identity
//!
//! A currency is either the host's native currency or a token contract.
//! Wherever a currency is expressed as an address (config files, JSON),
//! the sentinel [`NATIVE_SENTINEL`] stands for the native currency.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::address::{Address, AddressError, ADDRESS_LEN};

/// Sentinel address for native currency (`0xEeee...EEeE`)
pub const NATIVE_SENTINEL: Address = Address::new([0xee; ADDRESS_LEN]);

/// Native currency or token
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Currency {
    /// Host native currency, moved as attached call value
    Native,
    /// Token contract, moved with transfers and allowances
    Token(Address),
}

impl Currency {
    /// Map an address to a currency, honoring the native sentinel
    pub fn from_address(address: Address) -> Self {
        if address == NATIVE_SENTINEL {
            Currency::Native
        } else {
            Currency::Token(address)
        }
    }

    /// Address form of this currency
    pub fn address(&self) -> Address {
        match self {
            Currency::Native => NATIVE_SENTINEL,
            Currency::Token(token) => *token,
        }
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, Currency::Native)
    }

    /// Token address, if any
    pub fn token(&self) -> Option<Address> {
        match self {
            Currency::Native => None,
            Currency::Token(token) => Some(*token),
        }
    }
}

impl From<Address> for Currency {
    fn from(address: Address) -> Self {
        Currency::from_address(address)
    }
}

impl FromStr for Currency {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("native") {
            return Ok(Currency::Native);
        }
        s.parse::<Address>().map(Currency::from_address)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Native => write!(f, "native"),
            Currency::Token(token) => write!(f, "token:{}", token),
        }
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Currency {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.address().to_hex())
    }
}

impl<'de> Deserialize<'de> for Currency {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_maps_to_native() {
        let sentinel: Address = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".parse().unwrap();
        assert_eq!(sentinel, NATIVE_SENTINEL);
        assert_eq!(Currency::from_address(sentinel), Currency::Native);
    }

    #[test]
    fn test_token_roundtrip() {
        let token = Address::from_label("dest-token");
        let currency = Currency::from(token);
        assert_eq!(currency, Currency::Token(token));
        assert_eq!(currency.token(), Some(token));
        assert!(!currency.is_native());
    }

    #[test]
    fn test_parse_native_keyword() {
        assert_eq!("native".parse::<Currency>().unwrap(), Currency::Native);
        assert_eq!(Currency::Native.address(), NATIVE_SENTINEL);
    }
}
