//! Reference loan system
//!
//! Keeps loan records in ledger storage so that every change is reverted with
//! the call that made it. Loans move through `Requested → Ongoing → Paid`.
//!
//! Amounts on the loan ledger are in loan-currency units; token amounts are
//! derived with the loan's oracle rate and the same rounding the ramp uses.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use ramp_common::{
    Address, Amount, FeeSchedule, LoanError, LoanRequestId, OracleError, Rate, Result,
};
use ramp_core::{cost, Cosigner, LoanLend, LoanSystem, RateOracle, ORACLE_READ_EVENT};
use ramp_ledger::{CallContext, Ledger};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

const LOAN_KEY_PREFIX: &[u8] = b"loan:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Requested,
    Ongoing,
    Paid,
}

/// Stored loan record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanRequestId,
    pub borrower: Address,
    /// Principal in loan-currency units
    pub amount: Amount,
    pub oracle: Option<Address>,
    pub status: LoanStatus,
    /// Loan-currency units paid so far
    pub paid: Amount,
    /// Current debt owner, set once lent
    pub owner: Option<Address>,
    pub cosigner: Option<Address>,
}

impl LoanRecord {
    pub fn outstanding(&self) -> Amount {
        match self.status {
            LoanStatus::Ongoing => self.amount.saturating_sub(self.paid),
            LoanStatus::Requested | LoanStatus::Paid => 0,
        }
    }
}

/// Loan system with a payment fee, a fee collector, and an oracle registry
pub struct MockLoanSystem {
    address: Address,
    token: Address,
    fee: FeeSchedule,
    fee_collector: Address,
    oracles: RwLock<HashMap<Address, Arc<dyn RateOracle>>>,
}

impl MockLoanSystem {
    pub fn new(address: Address, token: Address, fee: FeeSchedule, fee_collector: Address) -> Self {
        Self {
            address,
            token,
            fee,
            fee_collector,
            oracles: RwLock::new(HashMap::new()),
        }
    }

    pub fn fee_collector(&self) -> Address {
        self.fee_collector
    }

    /// Make an oracle available to new loan requests
    pub fn register_oracle(&self, oracle: Arc<dyn RateOracle>) {
        self.oracles.write().insert(oracle.address(), oracle);
    }

    /// Open a loan request; the id is derived from the request fields
    pub fn request_loan(
        &self,
        ledger: &mut Ledger,
        borrower: Address,
        amount: Amount,
        oracle: Option<Address>,
        salt: u64,
    ) -> Result<LoanRequestId> {
        if let Some(oracle) = oracle {
            if !self.oracles.read().contains_key(&oracle) {
                return Err(OracleError::Unknown(oracle).into());
            }
        }
        let oracle_bytes = oracle.unwrap_or(Address::ZERO);
        let id = LoanRequestId::derive(&[
            self.address.as_bytes(),
            borrower.as_bytes(),
            &amount.to_be_bytes(),
            oracle_bytes.as_bytes(),
            &salt.to_be_bytes(),
        ]);
        if self.find(ledger, &id)?.is_some() {
            return Err(LoanError::AlreadyExists(id).into());
        }

        let record = LoanRecord {
            id,
            borrower,
            amount,
            oracle,
            status: LoanStatus::Requested,
            paid: 0,
            owner: None,
            cosigner: None,
        };
        self.save(ledger, &record)?;
        ledger.emit(
            self.address,
            "requested",
            json!({ "loan_id": id.to_hex(), "borrower": borrower.to_hex(), "amount": amount.to_string() }),
        );
        debug!(loan_id = %id, %borrower, amount, "loan requested");
        Ok(id)
    }

    pub fn loan(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<LoanRecord> {
        self.find(ledger, loan_id)?
            .ok_or_else(|| LoanError::NotFound(*loan_id).into())
    }

    pub fn owner_of(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Option<Address>> {
        Ok(self.loan(ledger, loan_id)?.owner)
    }

    fn key(loan_id: &LoanRequestId) -> Vec<u8> {
        let mut key = LOAN_KEY_PREFIX.to_vec();
        key.extend_from_slice(loan_id.as_bytes());
        key
    }

    fn find(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Option<LoanRecord>> {
        Ok(ledger.storage_load(self.address, &Self::key(loan_id))?)
    }

    fn save(&self, ledger: &mut Ledger, record: &LoanRecord) -> Result<()> {
        Ok(ledger.storage_save(self.address, &Self::key(&record.id), record)?)
    }

    fn oracle_for(&self, record: &LoanRecord) -> Result<Option<Arc<dyn RateOracle>>> {
        match record.oracle {
            None => Ok(None),
            Some(address) => self
                .oracles
                .read()
                .get(&address)
                .cloned()
                .map(Some)
                .ok_or_else(|| OracleError::Unknown(address).into()),
        }
    }

    /// Decode the loan's rate and record the reading
    fn read_rate(&self, ledger: &mut Ledger, record: &LoanRecord, oracle_data: &[u8]) -> Result<Rate> {
        let Some(oracle) = self.oracle_for(record)? else {
            return Ok(Rate::IDENTITY);
        };
        let decoded = oracle.decode_rate(oracle_data)?;
        let rate = Rate::new(decoded.tokens, decoded.equivalent)?;
        ledger.emit(
            self.address,
            ORACLE_READ_EVENT,
            json!({
                "oracle": oracle.address().to_hex(),
                "tokens": rate.tokens.to_string(),
                "equivalent": rate.equivalent.to_string(),
            }),
        );
        Ok(rate)
    }

    fn approve_cosigner(
        &self,
        ledger: &mut Ledger,
        request: &LoanLend<'_>,
        cosigner: &dyn Cosigner,
    ) -> Result<Amount> {
        let cost = cosigner.request_cost(ledger, request.loan_id, request.cosigner_data)?;
        if cost > request.cosigner_limit_cost {
            return Err(LoanError::CosignerCostExceeded {
                cost,
                limit: request.cosigner_limit_cost,
            }
            .into());
        }
        let accepted = ledger.call(self.address, cosigner.address(), 0, |ledger, ctx| {
            cosigner.request_cosign(ledger, ctx, request.loan_id, request.cosigner_data)
        })?;
        if !accepted {
            return Err(LoanError::CosignerDeclined(*request.loan_id).into());
        }
        Ok(cost)
    }
}

impl LoanSystem for MockLoanSystem {
    fn address(&self) -> Address {
        self.address
    }

    fn token(&self) -> Address {
        self.token
    }

    fn fee_schedule(&self) -> FeeSchedule {
        self.fee
    }

    fn requested_amount(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Amount> {
        Ok(self.loan(ledger, loan_id)?.amount)
    }

    fn outstanding_balance(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Amount> {
        Ok(self.loan(ledger, loan_id)?.outstanding())
    }

    fn oracle(&self, ledger: &Ledger, loan_id: &LoanRequestId) -> Result<Option<Arc<dyn RateOracle>>> {
        let record = self.loan(ledger, loan_id)?;
        self.oracle_for(&record)
    }

    fn lend(&self, ledger: &mut Ledger, ctx: CallContext, request: LoanLend<'_>) -> Result<()> {
        let mut record = self.loan(ledger, request.loan_id)?;
        if record.status != LoanStatus::Requested {
            return Err(LoanError::NotRequested(record.id).into());
        }

        let rate = self.read_rate(ledger, &record, request.oracle_data)?;
        let cosigner_cost = match request.cosigner {
            Some(cosigner) => self.approve_cosigner(ledger, &request, cosigner)?,
            None => 0,
        };

        let amounts = cost::lend_requirement(record.amount, cosigner_cost, rate)?;
        let principal_tokens = rate.to_token(record.amount)?;
        ledger.transfer_from(self.token, self.address, ctx.caller, record.borrower, principal_tokens)?;
        if let Some(cosigner) = request.cosigner {
            let fee_tokens = amounts.tokens.saturating_sub(principal_tokens);
            ledger.transfer_from(self.token, self.address, ctx.caller, cosigner.address(), fee_tokens)?;
            record.cosigner = Some(cosigner.address());
        }

        record.status = LoanStatus::Ongoing;
        record.owner = Some(ctx.caller);
        self.save(ledger, &record)?;
        ledger.emit(
            self.address,
            "lent",
            json!({
                "loan_id": record.id.to_hex(),
                "lender": ctx.caller.to_hex(),
                "tokens": amounts.tokens.to_string(),
                "callback_bytes": request.callback_data.len(),
            }),
        );
        debug!(loan_id = %record.id, lender = %ctx.caller, tokens = amounts.tokens, "loan lent");
        Ok(())
    }

    fn pay_from(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        payer: Address,
        loan_id: &LoanRequestId,
        amount: Amount,
        oracle_data: &[u8],
    ) -> Result<Amount> {
        let mut record = self.loan(ledger, loan_id)?;
        if record.status != LoanStatus::Ongoing {
            return Err(LoanError::NotOngoing(record.id).into());
        }
        let effective = amount.min(record.outstanding());
        if effective == 0 {
            return Ok(0);
        }

        let rate = self.read_rate(ledger, &record, oracle_data)?;
        let amounts = cost::pay_requirement(effective, record.outstanding(), rate, self.fee)?;
        let owner = record
            .owner
            .ok_or_else(|| LoanError::Rejected(format!("loan {} has no owner", record.id)))?;
        ledger.transfer_from(self.token, self.address, ctx.caller, owner, amounts.tokens)?;
        ledger.transfer_from(self.token, self.address, ctx.caller, self.fee_collector, amounts.fee)?;

        record.paid += effective;
        if record.paid >= record.amount {
            record.status = LoanStatus::Paid;
        }
        self.save(ledger, &record)?;
        ledger.emit(
            self.address,
            "paid",
            json!({
                "loan_id": record.id.to_hex(),
                "payer": payer.to_hex(),
                "amount": effective.to_string(),
                "tokens": amounts.tokens.to_string(),
                "fee": amounts.fee.to_string(),
            }),
        );
        debug!(loan_id = %record.id, %payer, effective, "loan paid");
        Ok(effective)
    }

    fn transfer_debt(
        &self,
        ledger: &mut Ledger,
        ctx: CallContext,
        loan_id: &LoanRequestId,
        to: Address,
    ) -> Result<()> {
        let mut record = self.loan(ledger, loan_id)?;
        if record.owner != Some(ctx.caller) {
            return Err(LoanError::NotDebtOwner {
                loan_id: *loan_id,
                caller: ctx.caller,
            }
            .into());
        }
        record.owner = Some(to);
        self.save(ledger, &record)
    }
}
