//! Core Ramp types

pub mod address;
pub mod currency;
pub mod fee;
pub mod loan_id;
pub mod rate;

/// Count of a currency's base units
pub type Amount = u128;
