//! Re-entering collaborators
//!
//! [`ReentrantConverter`] fills conversions like a [`FixedRateConverter`] and
//! [`ReentrantCosigner`] cosigns like a [`TestCosigner`], but each first calls
//! back into the ramp with a settlement of its own. Used to show that a nested
//! settlement cannot touch the funds of the settlement it interrupts.

use std::sync::Arc;

use parking_lot::Mutex;
use ramp_common::{Address, Amount, Currency, LoanRequestId, Result};
use ramp_core::{Converter, ConverterRamp, Cosigner, LendRequest, PayRequest, SettlementReceipt};
use ramp_ledger::{CallContext, Ledger};
use tracing::debug;

use crate::converter::FixedRateConverter;
use crate::cosigner::TestCosigner;

/// Settlement to run against the ramp from inside a callback
#[derive(Clone)]
pub enum ReentryCall {
    Lend(LendRequest),
    Pay(PayRequest),
}

impl From<LendRequest> for ReentryCall {
    fn from(request: LendRequest) -> Self {
        ReentryCall::Lend(request)
    }
}

impl From<PayRequest> for ReentryCall {
    fn from(request: PayRequest) -> Self {
        ReentryCall::Pay(request)
    }
}

/// Result of the nested call, kept for inspection
#[derive(Debug, Clone)]
pub enum ReentryOutcome {
    Settled(SettlementReceipt),
    Rejected(String),
}

/// One armed re-entry, fired at most once
struct Trigger {
    ramp: Arc<ConverterRamp>,
    pending: Mutex<Option<(ReentryCall, Amount)>>,
    outcome: Mutex<Option<ReentryOutcome>>,
}

impl Trigger {
    fn new(ramp: Arc<ConverterRamp>) -> Self {
        Self {
            ramp,
            pending: Mutex::new(None),
            outcome: Mutex::new(None),
        }
    }

    fn arm(&self, call: ReentryCall, value: Amount) {
        *self.pending.lock() = Some((call, value));
    }

    fn outcome(&self) -> Option<ReentryOutcome> {
        self.outcome.lock().clone()
    }

    /// Run the armed settlement as `caller`; disarms before re-entering so
    /// the nested settlement does not recurse
    fn fire(&self, ledger: &mut Ledger, caller: Address) {
        let pending = self.pending.lock().take();
        let Some((call, value)) = pending else {
            return;
        };
        debug!(%caller, depth = ledger.depth(), "re-entering ramp");
        let result = match &call {
            ReentryCall::Lend(request) => self.ramp.lend(ledger, caller, value, request),
            ReentryCall::Pay(request) => self.ramp.pay(ledger, caller, value, request),
        };
        let outcome = match result {
            Ok(receipt) => ReentryOutcome::Settled(receipt),
            Err(e) => ReentryOutcome::Rejected(e.to_string()),
        };
        *self.outcome.lock() = Some(outcome);
    }
}

pub struct ReentrantConverter {
    inner: FixedRateConverter,
    trigger: Trigger,
}

impl ReentrantConverter {
    pub fn new(address: Address, ramp: Arc<ConverterRamp>) -> Self {
        Self {
            inner: FixedRateConverter::new(address),
            trigger: Trigger::new(ramp),
        }
    }

    /// Rates used to fill conversions
    pub fn rates(&self) -> &FixedRateConverter {
        &self.inner
    }

    /// Settle through the ramp, attaching `value`, during the next conversion
    pub fn arm(&self, call: impl Into<ReentryCall>, value: Amount) {
        self.trigger.arm(call.into(), value);
    }

    pub fn outcome(&self) -> Option<ReentryOutcome> {
        self.trigger.outcome()
    }
}

impl Converter for ReentrantConverter {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn estimate_input(&self, ledger: &Ledger, from: Currency, to: Currency, exact_output: Amount) -> Result<Amount> {
        self.inner.estimate_input(ledger, from, to, exact_output)
    }

    fn convert_exact(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        from: Currency,
        to: Currency,
        exact_output: Amount,
        max_input: Amount,
    ) -> Result<Amount> {
        self.trigger.fire(ledger, self.address());
        self.inner
            .convert_exact(ledger, ctx, from, to, exact_output, max_input)
    }
}

pub struct ReentrantCosigner {
    inner: TestCosigner,
    trigger: Trigger,
}

impl ReentrantCosigner {
    pub fn new(address: Address, ramp: Arc<ConverterRamp>) -> Self {
        Self {
            inner: TestCosigner::new(address),
            trigger: Trigger::new(ramp),
        }
    }

    /// Fees and refusals applied when cosigning
    pub fn terms(&self) -> &TestCosigner {
        &self.inner
    }

    /// Settle through the ramp, attaching `value`, on the next cosign request
    pub fn arm(&self, call: impl Into<ReentryCall>, value: Amount) {
        self.trigger.arm(call.into(), value);
    }

    pub fn outcome(&self) -> Option<ReentryOutcome> {
        self.trigger.outcome()
    }
}

impl Cosigner for ReentrantCosigner {
    fn address(&self) -> Address {
        self.inner.address()
    }

    fn request_cost(&self, ledger: &Ledger, loan_id: &LoanRequestId, data: &[u8]) -> Result<Amount> {
        self.inner.request_cost(ledger, loan_id, data)
    }

    fn request_cosign(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        loan_id: &LoanRequestId,
        data: &[u8],
    ) -> Result<bool> {
        self.trigger.fire(ledger, self.address());
        self.inner.request_cosign(ledger, ctx, loan_id, data)
    }
}
