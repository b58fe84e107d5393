//! As-of bucket balances.

use chrono::NaiveDate;
use std::collections::HashMap;

use ledger_types::dates::days_since_epoch;
use ledger_types::{BucketBalance, LedgerEntry, LedgerError, LedgerKey, LedgerResult};

use crate::keeper::Keeper;

/// Replay `balance_amounts` of every entry effective on or before `as_of`
/// in chronological order. A bucket keeps the position of its first
/// appearance; later entries only overwrite the amount.
pub fn compute_balances_as_of(entries: &[LedgerEntry], as_of: i32) -> Vec<BucketBalance> {
    let mut applicable: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| e.effective_date <= as_of)
        .collect();
    applicable.sort_by(|a, b| a.chronological_cmp(b));

    let mut balances: Vec<BucketBalance> = Vec::new();
    let mut position: HashMap<i32, usize> = HashMap::new();
    for entry in applicable {
        for balance in &entry.balance_amounts {
            match position.get(&balance.bucket_type_id) {
                Some(&i) => balances[i].balance_amt = balance.balance_amt,
                None => {
                    position.insert(balance.bucket_type_id, balances.len());
                    balances.push(balance.clone());
                }
            }
        }
    }
    balances
}

impl Keeper {
    /// Balances as of a day count since the epoch. NotFound when the
    /// ledger has no entries at all.
    pub fn balances_as_of(&self, key: &LedgerKey, as_of: i32) -> LedgerResult<Vec<BucketBalance>> {
        let entries = self.list_ledger_entries(key)?;
        if entries.is_empty() {
            return Err(LedgerError::not_found("ledger entries"));
        }
        Ok(compute_balances_as_of(&entries, as_of))
    }

    pub fn balances_as_of_date(&self, key: &LedgerKey, as_of: NaiveDate) -> LedgerResult<Vec<BucketBalance>> {
        self.balances_as_of(key, days_since_epoch(as_of))
    }
}
