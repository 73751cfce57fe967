//! Undo journal
//!
//! Every ledger mutation pushes the value it overwrote. Reverting to a
//! checkpoint pops entries in reverse order and restores those values, which
//! makes nested calls independently all-or-nothing.

use ramp_common::{Address, Amount};

use crate::ledger::NativeReceive;

/// Position in the journal that a call can be reverted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(pub(crate) usize);

/// Previous value of one mutated ledger slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    Native {
        account: Address,
        previous: Amount,
    },
    Token {
        token: Address,
        account: Address,
        previous: Amount,
    },
    Allowance {
        token: Address,
        owner: Address,
        spender: Address,
        previous: Amount,
    },
    Storage {
        contract: Address,
        key: Vec<u8>,
        previous: Option<Vec<u8>>,
    },
    NativeReceive {
        account: Address,
        previous: NativeReceive,
    },
    Event,
}

#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.entries.len())
    }

    /// Remove and return every entry recorded after `checkpoint`, newest first
    pub(crate) fn unwind(&mut self, checkpoint: Checkpoint) -> Vec<JournalEntry> {
        if checkpoint.0 >= self.entries.len() {
            return Vec::new();
        }
        let mut undone = self.entries.split_off(checkpoint.0);
        undone.reverse();
        undone
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
