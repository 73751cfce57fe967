//! Ledger events

use ramp_common::Address;
use serde::{Deserialize, Serialize};

/// Event emitted by a contract during a call
///
/// Events emitted inside a call that later fails are removed with the rest of
/// the call's effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Contract that emitted the event
    pub emitter: Address,
    /// Event name (e.g., "oracle_read")
    pub name: String,
    /// Event payload
    pub attributes: serde_json::Value,
}

impl Event {
    pub fn new(emitter: Address, name: impl Into<String>, attributes: serde_json::Value) -> Self {
        Self {
            emitter,
            name: name.into(),
            attributes,
        }
    }

    /// Read a string attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}
