//! Entry reads and balance corrections.

use ledger_types::validation::validate_ledger_entry_amounts;
use ledger_types::{
    Amount, BucketBalance, LedgerBucketAmount, LedgerEntry, LedgerError, LedgerKey, LedgerResult,
};

use crate::keeper::Keeper;
use crate::keys;
use crate::store::{get_json, scan_json, set_json};

impl Keeper {
    /// Entries of a ledger ordered by effective date, then sequence.
    /// Empty when the ledger does not exist.
    pub fn list_ledger_entries(&self, key: &LedgerKey) -> LedgerResult<Vec<LedgerEntry>> {
        if !self.has_ledger(key)? {
            return Ok(Vec::new());
        }
        let mut entries: Vec<LedgerEntry> = scan_json(self.store.as_ref(), &keys::entries_prefix(key))?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by(LedgerEntry::chronological_cmp);
        Ok(entries)
    }

    pub fn get_ledger_entry(&self, key: &LedgerKey, correlation_id: &str) -> LedgerResult<Option<LedgerEntry>> {
        get_json(self.store.as_ref(), &keys::entry_key(key, correlation_id))
    }

    pub fn require_get_ledger_entry(&self, key: &LedgerKey, correlation_id: &str) -> LedgerResult<LedgerEntry> {
        self.get_ledger_entry(key, correlation_id)?
            .ok_or_else(|| LedgerError::not_found("ledger entry"))
    }

    /// Correct the amounts of an existing entry. Nothing else changes.
    pub fn update_entry_balances(
        &self,
        key: &LedgerKey,
        correlation_id: &str,
        total_amt: Amount,
        applied_amounts: Vec<LedgerBucketAmount>,
        balance_amounts: Vec<BucketBalance>,
    ) -> LedgerResult<()> {
        let mut entry = self
            .get_ledger_entry(key, correlation_id)?
            .ok_or_else(|| LedgerError::not_found("entry"))?;

        validate_ledger_entry_amounts(total_amt, &applied_amounts, &balance_amounts)?;

        entry.total_amt = total_amt;
        entry.applied_amounts = applied_amounts;
        entry.balance_amounts = balance_amounts;
        self.put_entry(key, &entry)
    }

    pub(crate) fn put_entry(&self, key: &LedgerKey, entry: &LedgerEntry) -> LedgerResult<()> {
        set_json(
            self.store.as_ref(),
            &keys::entry_key(key, &entry.correlation_id),
            entry,
        )
    }
}
