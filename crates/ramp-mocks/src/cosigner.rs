//! Test cosigner

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use ramp_common::{Address, Amount, LoanRequestId, Result};
use ramp_core::Cosigner;
use ramp_ledger::{CallContext, Ledger};
use serde_json::json;

/// Cosigner with a configurable fee per loan and an optional refusal list
#[derive(Debug, Default)]
pub struct TestCosigner {
    address: Address,
    costs: RwLock<HashMap<LoanRequestId, Amount>>,
    declined: RwLock<HashSet<LoanRequestId>>,
}

impl TestCosigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Fee charged for cosigning `loan_id`
    pub fn set_cost(&self, loan_id: LoanRequestId, cost: Amount) {
        self.costs.write().insert(loan_id, cost);
    }

    /// Refuse (or accept again) to cosign `loan_id`
    pub fn set_declined(&self, loan_id: LoanRequestId, declined: bool) {
        let mut set = self.declined.write();
        if declined {
            set.insert(loan_id);
        } else {
            set.remove(&loan_id);
        }
    }
}

impl Cosigner for TestCosigner {
    fn address(&self) -> Address {
        self.address
    }

    fn request_cost(&self, _ledger: &Ledger, loan_id: &LoanRequestId, _data: &[u8]) -> Result<Amount> {
        Ok(self.costs.read().get(loan_id).copied().unwrap_or(0))
    }

    fn request_cosign(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        loan_id: &LoanRequestId,
        _data: &[u8],
    ) -> Result<bool> {
        if self.declined.read().contains(loan_id) {
            return Ok(false);
        }
        ledger.emit(
            self.address,
            "cosigned",
            json!({ "loan_id": loan_id.to_hex(), "requested_by": ctx.caller.to_hex() }),
        );
        Ok(true)
    }
}
