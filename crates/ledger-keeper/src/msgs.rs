//! Signed message handlers.
//!
//! Every ledger mutation goes through [`authorize`] first; class
//! configuration requires the class maintainer and bulk import requires the
//! keeper authority.

use serde::Serialize;
use tracing::info;

use ledger_types::{
    Amount, BucketBalance, DayCountConvention, InterestAccrualMethod, Ledger, LedgerBucketAmount,
    LedgerClass, LedgerClassType, LedgerEntry, LedgerError, LedgerKey, LedgerResult, MsgBulkImport,
    PaymentFrequency,
};

use crate::authz::authorize;
use crate::keeper::Keeper;
use crate::keys::ClassTypeKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkImportOutcome {
    pub ledgers_created: usize,
    pub entries_appended: usize,
}

pub struct MsgServer<'k> {
    keeper: &'k Keeper,
}

impl<'k> MsgServer<'k> {
    pub fn new(keeper: &'k Keeper) -> Self {
        Self { keeper }
    }

    fn authorize(&self, signer: &str, key: &LedgerKey) -> LedgerResult<()> {
        authorize(self.keeper.registry(), signer, key)
    }

    fn require_maintainer(&self, signer: &str, ledger_class_id: &str) -> LedgerResult<()> {
        if !self.keeper.is_ledger_class_maintainer(signer, ledger_class_id)? {
            return Err(LedgerError::unauthorized(format!(
                "{} is not the maintainer of ledger class {}",
                signer, ledger_class_id
            )));
        }
        Ok(())
    }

    pub fn create_ledger(&self, signer: &str, ledger: Ledger) -> LedgerResult<()> {
        let key = ledger
            .key
            .clone()
            .ok_or_else(|| LedgerError::missing_field("ledger.key"))?;
        self.authorize(signer, &key)?;
        self.keeper.add_ledger(ledger)
    }

    pub fn append(&self, signer: &str, key: &LedgerKey, entries: &[LedgerEntry]) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper.append_entries(key, entries)
    }

    pub fn update_balances(
        &self,
        signer: &str,
        key: &LedgerKey,
        correlation_id: &str,
        total_amt: Amount,
        applied_amounts: Vec<LedgerBucketAmount>,
        balance_amounts: Vec<BucketBalance>,
    ) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper
            .update_entry_balances(key, correlation_id, total_amt, applied_amounts, balance_amounts)
    }

    pub fn update_status(&self, signer: &str, key: &LedgerKey, status_type_id: i32) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper.update_ledger_status(key, status_type_id)
    }

    pub fn update_interest_rate(
        &self,
        signer: &str,
        key: &LedgerKey,
        interest_rate: i32,
        day_count_convention: DayCountConvention,
        accrual_method: InterestAccrualMethod,
    ) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper
            .update_ledger_interest_rate(key, interest_rate, day_count_convention, accrual_method)
    }

    pub fn update_payment(
        &self,
        signer: &str,
        key: &LedgerKey,
        next_pmt_amt: Amount,
        next_pmt_date: i32,
        payment_frequency: PaymentFrequency,
    ) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper
            .update_ledger_payment(key, next_pmt_amt, next_pmt_date, payment_frequency)
    }

    pub fn update_maturity_date(&self, signer: &str, key: &LedgerKey, maturity_date: i32) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper.update_ledger_maturity_date(key, maturity_date)
    }

    pub fn destroy(&self, signer: &str, key: &LedgerKey) -> LedgerResult<()> {
        self.authorize(signer, key)?;
        self.keeper.destroy_ledger(key)
    }

    /// The signer becomes responsible for the class and must name itself
    /// as maintainer.
    pub fn create_ledger_class(&self, signer: &str, class: LedgerClass) -> LedgerResult<()> {
        if class.maintainer_address != signer {
            return Err(LedgerError::unauthorized(
                "maintainer address must be the signer",
            ));
        }
        self.keeper.add_ledger_class(class)
    }

    pub fn add_class_type(
        &self,
        signer: &str,
        kind: ClassTypeKind,
        ledger_class_id: &str,
        class_type: LedgerClassType,
    ) -> LedgerResult<()> {
        self.require_maintainer(signer, ledger_class_id)?;
        self.keeper.add_class_type(kind, ledger_class_id, class_type)
    }

    /// Apply one import chunk: for each record create the ledger when one is
    /// given, then append its entries.
    pub fn bulk_import(&self, msg: &MsgBulkImport) -> LedgerResult<BulkImportOutcome> {
        if msg.authority != self.keeper.authority() {
            return Err(LedgerError::unauthorized(format!(
                "expected authority {}, got {}",
                self.keeper.authority(),
                msg.authority
            )));
        }

        let mut outcome = BulkImportOutcome::default();
        for (i, record) in msg.chunk.ledger_to_entries.iter().enumerate() {
            let scope = format!("ledger_to_entries[{}]", i);
            record.validate().map_err(|e| e.within(&scope))?;

            if let Some(ledger) = &record.ledger {
                let mut ledger = ledger.clone();
                ledger.key = Some(record.ledger_key.clone());
                self.keeper.add_ledger(ledger).map_err(|e| e.within(&scope))?;
                outcome.ledgers_created += 1;
            }
            if !record.entries.is_empty() {
                self.keeper
                    .append_entries(&record.ledger_key, &record.entries)
                    .map_err(|e| e.within(&scope))?;
                outcome.entries_appended += record.entries.len();
            }
        }

        info!(
            ledgers = outcome.ledgers_created,
            entries = outcome.entries_appended,
            "bulk import applied"
        );
        Ok(outcome)
    }
}
