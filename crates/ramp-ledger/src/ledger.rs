//! Host ledger state
//!
//! Tracks native balances, token balances, allowances, contract storage, and
//! the event log. All mutations go through private setters that journal the
//! overwritten value.

use std::collections::HashMap;

use ramp_common::{Address, Amount, Currency, LedgerError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::trace;

use crate::event::Event;
use crate::journal::{Checkpoint, Journal, JournalEntry};

/// How an account treats plain native transfers
///
/// Value attached to a call always reaches the callee; the policy only
/// governs [`Ledger::send_native`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NativeReceive {
    #[default]
    Accept,
    Reject,
    /// Accept only while the account is executing a call
    DuringCall,
}

/// Journaled host ledger
#[derive(Debug, Default)]
pub struct Ledger {
    native: HashMap<Address, Amount>,
    tokens: HashMap<(Address, Address), Amount>,
    allowances: HashMap<(Address, Address, Address), Amount>,
    storage: HashMap<(Address, Vec<u8>), Vec<u8>>,
    native_receive: HashMap<Address, NativeReceive>,
    events: Vec<Event>,
    journal: Journal,
    pub(crate) depth: usize,
    /// Targets of the calls currently executing, outermost first
    pub(crate) frames: Vec<Address>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    // ============ READS ============

    pub fn native_balance(&self, account: Address) -> Amount {
        self.native.get(&account).copied().unwrap_or(0)
    }

    pub fn token_balance(&self, token: Address, account: Address) -> Amount {
        self.tokens.get(&(token, account)).copied().unwrap_or(0)
    }

    /// Balance of either kind of currency
    pub fn balance(&self, currency: Currency, account: Address) -> Amount {
        match currency {
            Currency::Native => self.native_balance(account),
            Currency::Token(token) => self.token_balance(token, account),
        }
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> Amount {
        self.allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn native_receive(&self, account: Address) -> NativeReceive {
        self.native_receive.get(&account).copied().unwrap_or_default()
    }

    /// Whether a plain native transfer to `account` would be refused now
    pub fn rejects_native(&self, account: Address) -> bool {
        match self.native_receive(account) {
            NativeReceive::Accept => false,
            NativeReceive::Reject => true,
            NativeReceive::DuringCall => !self.is_executing(account),
        }
    }

    /// Whether `account` is the target of a call in progress
    pub fn is_executing(&self, account: Address) -> bool {
        self.frames.contains(&account)
    }

    /// All events emitted by committed (or in-flight) calls
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Events with the given name
    pub fn events_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.events.iter().filter(move |e| e.name == name)
    }

    /// Current call nesting depth (0 outside any call)
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ============ SETUP ============

    /// Credit native currency out of thin air (test and simulator setup)
    pub fn mint_native(&mut self, account: Address, amount: Amount) {
        let balance = self.native_balance(account).saturating_add(amount);
        self.set_native(account, balance);
    }

    /// Credit tokens out of thin air (test and simulator setup)
    pub fn mint_token(&mut self, token: Address, account: Address, amount: Amount) {
        let balance = self.token_balance(token, account).saturating_add(amount);
        self.set_token(token, account, balance);
    }

    /// Set how `account` treats plain native transfers
    pub fn set_native_receive(&mut self, account: Address, policy: NativeReceive) {
        let previous = self.native_receive(account);
        self.journal
            .record(JournalEntry::NativeReceive { account, previous });
        self.apply_native_receive(account, policy);
    }

    // ============ VALUE MOVEMENT ============

    /// Plain native transfer; fails if the recipient's policy refuses it
    pub fn send_native(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount > 0 && self.rejects_native(to) {
            return Err(LedgerError::NativeRejected(to));
        }
        self.move_native(from, to, amount)
    }

    /// Native transfer attached to a call; the callee always accepts it
    pub(crate) fn move_native(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.native_balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: Currency::Native,
                account: from,
                required: amount,
                available,
            });
        }
        let credited = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(to))?;
        self.set_native(from, available - amount);
        self.set_native(to, credited);
        Ok(())
    }

    /// Token transfer initiated by the holder
    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let available = self.token_balance(token, from);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset: Currency::Token(token),
                account: from,
                required: amount,
                available,
            });
        }
        let credited = self
            .token_balance(token, to)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow(to))?;
        self.set_token(token, from, available - amount);
        self.set_token(token, to, credited);
        Ok(())
    }

    /// Token transfer by `spender` out of `owner`, consuming allowance
    pub fn transfer_from(
        &mut self,
        token: Address,
        spender: Address,
        owner: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let allowed = self.allowance(token, owner, spender);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                token,
                owner,
                spender,
                required: amount,
                allowed,
            });
        }
        self.transfer(token, owner, to, amount)?;
        self.set_allowance(token, owner, spender, allowed - amount);
        Ok(())
    }

    /// Set the allowance `owner` grants to `spender`
    pub fn approve(&mut self, token: Address, owner: Address, spender: Address, amount: Amount) {
        self.set_allowance(token, owner, spender, amount);
    }

    // ============ STORAGE ============

    /// Load a typed value from a contract's storage
    pub fn storage_load<T: DeserializeOwned>(
        &self,
        contract: Address,
        key: &[u8],
    ) -> Result<Option<T>, LedgerError> {
        match self.storage.get(&(contract, key.to_vec())) {
            Some(bytes) => bincode::deserialize(bytes)
                .map(Some)
                .map_err(|e| LedgerError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    /// Save a typed value into a contract's storage
    pub fn storage_save<T: Serialize>(
        &mut self,
        contract: Address,
        key: &[u8],
        value: &T,
    ) -> Result<(), LedgerError> {
        let bytes = bincode::serialize(value).map_err(|e| LedgerError::Codec(e.to_string()))?;
        let slot = (contract, key.to_vec());
        let previous = self.storage.insert(slot, bytes);
        self.journal.record(JournalEntry::Storage {
            contract,
            key: key.to_vec(),
            previous,
        });
        Ok(())
    }

    // ============ EVENTS ============

    /// Append an event to the log
    pub fn emit(&mut self, emitter: Address, name: impl Into<String>, attributes: serde_json::Value) {
        self.events.push(Event::new(emitter, name, attributes));
        self.journal.record(JournalEntry::Event);
    }

    // ============ JOURNAL ============

    /// Mark the current journal position
    pub fn checkpoint(&self) -> Checkpoint {
        self.journal.checkpoint()
    }

    /// Undo every mutation made after `checkpoint`
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        let undone = self.journal.unwind(checkpoint);
        trace!(entries = undone.len(), "reverting ledger");
        for entry in undone {
            match entry {
                JournalEntry::Native { account, previous } => {
                    Self::restore(&mut self.native, account, previous);
                }
                JournalEntry::Token {
                    token,
                    account,
                    previous,
                } => {
                    Self::restore(&mut self.tokens, (token, account), previous);
                }
                JournalEntry::Allowance {
                    token,
                    owner,
                    spender,
                    previous,
                } => {
                    Self::restore(&mut self.allowances, (token, owner, spender), previous);
                }
                JournalEntry::Storage {
                    contract,
                    key,
                    previous,
                } => match previous {
                    Some(bytes) => {
                        self.storage.insert((contract, key), bytes);
                    }
                    None => {
                        self.storage.remove(&(contract, key));
                    }
                },
                JournalEntry::NativeReceive { account, previous } => {
                    self.apply_native_receive(account, previous);
                }
                JournalEntry::Event => {
                    self.events.pop();
                }
            }
        }
    }

    /// Forget undo history once the outermost call has committed
    pub(crate) fn commit(&mut self) {
        self.journal.clear();
    }

    /// Number of journaled mutations not yet committed
    pub fn pending_mutations(&self) -> usize {
        self.journal.len()
    }

    fn restore<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Amount>, key: K, previous: Amount) {
        if previous == 0 {
            map.remove(&key);
        } else {
            map.insert(key, previous);
        }
    }

    fn apply_native_receive(&mut self, account: Address, policy: NativeReceive) {
        if policy == NativeReceive::Accept {
            self.native_receive.remove(&account);
        } else {
            self.native_receive.insert(account, policy);
        }
    }

    fn set_native(&mut self, account: Address, value: Amount) {
        let previous = self.native_balance(account);
        self.journal
            .record(JournalEntry::Native { account, previous });
        Self::restore(&mut self.native, account, value);
    }

    fn set_token(&mut self, token: Address, account: Address, value: Amount) {
        let previous = self.token_balance(token, account);
        self.journal.record(JournalEntry::Token {
            token,
            account,
            previous,
        });
        Self::restore(&mut self.tokens, (token, account), value);
    }

    fn set_allowance(&mut self, token: Address, owner: Address, spender: Address, value: Amount) {
        let previous = self.allowance(token, owner, spender);
        self.journal.record(JournalEntry::Allowance {
            token,
            owner,
            spender,
            previous,
        });
        Self::restore(&mut self.allowances, (token, owner, spender), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn accounts() -> (Address, Address, Address) {
        (
            Address::from_label("token"),
            Address::from_label("alice"),
            Address::from_label("bob"),
        )
    }

    #[test]
    fn test_transfer() {
        let (token, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        ledger.mint_token(token, alice, 100);

        ledger.transfer(token, alice, bob, 30).unwrap();
        assert_eq!(ledger.token_balance(token, alice), 70);
        assert_eq!(ledger.token_balance(token, bob), 30);
    }

    #[test]
    fn test_insufficient_balance() {
        let (token, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        ledger.mint_token(token, alice, 10);

        let result = ledger.transfer(token, alice, bob, 11);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientBalance { required: 11, available: 10, .. })
        ));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let (token, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        ledger.mint_token(token, alice, 100);
        ledger.approve(token, alice, bob, 50);

        ledger.transfer_from(token, bob, alice, bob, 20).unwrap();
        assert_eq!(ledger.allowance(token, alice, bob), 30);

        let result = ledger.transfer_from(token, bob, alice, bob, 31);
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientAllowance { allowed: 30, .. })
        ));
    }

    #[test]
    fn test_rejecting_recipient() {
        let (_, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        ledger.mint_native(alice, 5);
        ledger.set_native_receive(bob, NativeReceive::Reject);

        assert_eq!(
            ledger.send_native(alice, bob, 1),
            Err(LedgerError::NativeRejected(bob))
        );
        // Zero-value sends never bounce
        assert!(ledger.send_native(alice, bob, 0).is_ok());
    }

    #[test]
    fn test_receive_only_during_call() {
        let (_, alice, bob) = accounts();
        let carol = Address::from_label("carol");
        let mut ledger = Ledger::new();
        ledger.mint_native(alice, 10);
        ledger.set_native_receive(bob, NativeReceive::DuringCall);

        assert_eq!(
            ledger.send_native(alice, bob, 1),
            Err(LedgerError::NativeRejected(bob))
        );

        // Change sent back to bob by a counterparty bob is calling
        let result: Result<(), LedgerError> = ledger.call(alice, bob, 4, |ledger, ctx| {
            ledger.call(ctx.target, carol, 4, |ledger, inner| {
                ledger.send_native(inner.target, inner.caller, 3)
            })
        });
        assert!(result.is_ok());
        assert_eq!(ledger.native_balance(bob), 3);
        assert_eq!(ledger.native_balance(carol), 1);
        assert!(!ledger.is_executing(bob));
        assert!(ledger.rejects_native(bob));
    }

    #[test]
    fn test_receive_policy_reverts() {
        let (_, _, bob) = accounts();
        let mut ledger = Ledger::new();

        let checkpoint = ledger.checkpoint();
        ledger.set_native_receive(bob, NativeReceive::Reject);
        ledger.revert_to(checkpoint);
        assert_eq!(ledger.native_receive(bob), NativeReceive::Accept);
    }

    #[test]
    fn test_revert_restores_everything() {
        let (token, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        ledger.mint_token(token, alice, 100);
        ledger.mint_native(alice, 7);

        let checkpoint = ledger.checkpoint();
        ledger.transfer(token, alice, bob, 40).unwrap();
        ledger.send_native(alice, bob, 7).unwrap();
        ledger.approve(token, alice, bob, 99);
        ledger.storage_save(bob, b"key", &42u64).unwrap();
        ledger.emit(bob, "moved", serde_json::json!({}));
        ledger.revert_to(checkpoint);

        assert_eq!(ledger.token_balance(token, alice), 100);
        assert_eq!(ledger.token_balance(token, bob), 0);
        assert_eq!(ledger.native_balance(alice), 7);
        assert_eq!(ledger.allowance(token, alice, bob), 0);
        assert_eq!(ledger.storage_load::<u64>(bob, b"key").unwrap(), None);
        assert!(ledger.events().is_empty());
    }

    #[test]
    fn test_storage_roundtrip() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Record {
            owner: Address,
            amount: u128,
        }

        let (_, alice, bob) = accounts();
        let mut ledger = Ledger::new();
        let record = Record {
            owner: alice,
            amount: 1_000,
        };
        ledger.storage_save(bob, b"record", &record).unwrap();
        assert_eq!(ledger.storage_load::<Record>(bob, b"record").unwrap(), Some(record));
    }
}
