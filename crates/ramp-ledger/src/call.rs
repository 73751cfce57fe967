//! Nested calls
//!
//! A call moves the attached native value from the caller to the target, runs
//! the target's logic, and reverts every ledger mutation made inside it if that
//! logic fails. Calls nest: an inner failure that the outer logic handles
//! leaves the outer call's effects intact.

use ramp_common::{Address, Amount, LedgerError};
use tracing::trace;

use crate::ledger::Ledger;

/// What the callee sees about how it was invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Immediate caller
    pub caller: Address,
    /// Address being called
    pub target: Address,
    /// Native value attached to the call
    pub value: Amount,
}

impl Ledger {
    /// Invoke `f` as `target`, attaching `value` native units from `caller`
    ///
    /// On `Err`, every mutation performed since the call started (including the
    /// attached value transfer) is undone before the error is returned.
    pub fn call<T, E, F>(&mut self, caller: Address, target: Address, value: Amount, f: F) -> Result<T, E>
    where
        E: From<LedgerError>,
        F: FnOnce(&mut Ledger, CallContext) -> Result<T, E>,
    {
        let checkpoint = self.checkpoint();
        self.depth += 1;
        self.frames.push(target);
        trace!(%caller, %target, value, depth = self.depth, "call");

        let result = match self.move_native(caller, target, value) {
            Ok(()) => f(
                self,
                CallContext {
                    caller,
                    target,
                    value,
                },
            ),
            Err(e) => Err(E::from(e)),
        };

        self.frames.pop();
        self.depth -= 1;
        match result {
            Ok(value) => {
                if self.depth == 0 {
                    self.commit();
                }
                Ok(value)
            }
            Err(e) => {
                self.revert_to(checkpoint);
                Err(e)
            }
        }
    }

    /// Run `f` all-or-nothing without moving value or changing the caller
    ///
    /// Calls made inside `f` do not commit on their own; a failure of `f`
    /// undoes them too.
    pub fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
    {
        let checkpoint = self.checkpoint();
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if result.is_err() {
            self.revert_to(checkpoint);
        } else if self.depth == 0 {
            self.commit();
        }
        result
    }
}
