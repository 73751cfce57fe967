//! # Ramp Ledger
//!
//! In-process host ledger that gives the settlement engine the guarantees an
//! on-chain host would: value movement, allowances, contract storage, an
//! event log, and all-or-nothing execution of nested calls.
//!
//! ## Components
//!
//! - [`Ledger`]: balances, allowances, storage, events, and each account's
//!   [`NativeReceive`] policy
//! - [`journal`]: undo log behind [`Ledger::checkpoint`] / [`Ledger::revert_to`]
//! - [`call`]: [`CallContext`] and [`Ledger::call`], which attaches native
//!   value and reverts everything done inside a failed call
//! - [`event`]: emitted [`Event`] records
//!
//! ## Example
//!
//! ```rust
//! use ramp_common::{Address, LedgerError};
//! use ramp_ledger::Ledger;
//!
//! let token = Address::from_label("token");
//! let alice = Address::from_label("alice");
//! let bob = Address::from_label("bob");
//!
//! let mut ledger = Ledger::new();
//! ledger.mint_token(token, alice, 100);
//!
//! // A failing call leaves no trace
//! let result: Result<(), LedgerError> = ledger.call(alice, bob, 0, |ledger, ctx| {
//!     ledger.transfer(token, ctx.caller, bob, 60)?;
//!     ledger.transfer(token, ctx.caller, bob, 60)
//! });
//! assert!(result.is_err());
//! assert_eq!(ledger.token_balance(token, alice), 100);
//! ```

pub mod call;
pub mod event;
pub mod journal;
pub mod ledger;

pub use call::CallContext;
pub use event::Event;
pub use journal::Checkpoint;
pub use ledger::{Ledger, NativeReceive};
