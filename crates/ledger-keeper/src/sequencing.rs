//! Appending entries while keeping same-day sequence numbers unique.
//!
//! Entries sharing an effective date are ordered by `sequence`. Inserting
//! at a sequence that is already taken (or below existing ones) pushes every
//! entry at or after that position up by one.

use tracing::debug;

use ledger_types::validation::validate_sequence;
use ledger_types::{LedgerEntry, LedgerError, LedgerKey, LedgerResult, MAX_ENTRY_SEQUENCE};

use crate::events::LedgerEvent;
use crate::keeper::Keeper;
use crate::keys::ClassTypeKind;

/// Shift the same-day entries of `existing` that sit at or after `new`'s
/// sequence. Returns the indices that were shifted.
///
/// Bounds are checked for the whole group before anything is modified, so
/// an error leaves `existing` untouched.
pub fn shift_sequences(existing: &mut [LedgerEntry], new: &LedgerEntry) -> LedgerResult<Vec<usize>> {
    let mut group: Vec<usize> = existing
        .iter()
        .enumerate()
        .filter(|(_, e)| e.effective_date == new.effective_date)
        .map(|(i, _)| i)
        .collect();
    group.sort_by_key(|&i| existing[i].sequence);

    let shifted = match group.iter().position(|&i| existing[i].sequence >= new.sequence) {
        Some(start) => group.split_off(start),
        None => Vec::new(),
    };

    for &i in &shifted {
        let entry = &existing[i];
        validate_sequence(entry.sequence.saturating_add(1)).map_err(|_| {
            LedgerError::invalid_field(
                "sequence",
                format!(
                    "inserting at {} would push entry {:?} past the limit of {}",
                    new.sequence, entry.correlation_id, MAX_ENTRY_SEQUENCE
                ),
            )
        })?;
    }
    for &i in &shifted {
        existing[i].sequence += 1;
    }
    Ok(shifted)
}

impl Keeper {
    /// Append entries to an existing ledger, one at a time.
    ///
    /// A failing entry aborts the call; entries before it stay appended.
    pub fn append_entries(&self, key: &LedgerKey, entries: &[LedgerEntry]) -> LedgerResult<()> {
        let ledger = self.require_get_ledger(key)?;
        let mut existing = self.list_ledger_entries(key)?;
        let block_date = self.block_date();

        for entry in entries {
            entry.validate()?;

            if self.get_ledger_entry(key, &entry.correlation_id)?.is_some() {
                return Err(LedgerError::already_exists(format!(
                    "ledger entry with correlation id {:?}",
                    entry.correlation_id
                )));
            }

            if entry.posted_date > block_date {
                return Err(LedgerError::invalid_field(
                    "posted_date",
                    "cannot be in the future",
                ));
            }

            if !self.has_class_type(ClassTypeKind::Entry, &ledger.ledger_class_id, entry.entry_type_id)? {
                return Err(LedgerError::invalid_field(
                    "entry_type_id",
                    "entry type doesn't exist",
                ));
            }

            let shifted = shift_sequences(&mut existing, entry)?;
            for &i in &shifted {
                self.put_entry(key, &existing[i])?;
            }
            self.put_entry(key, entry)?;

            debug!(
                ledger = %key,
                correlation_id = %entry.correlation_id,
                sequence = entry.sequence,
                shifted = shifted.len(),
                "entry appended"
            );
            self.emit(LedgerEvent::EntryAdded {
                key: key.clone(),
                correlation_id: entry.correlation_id.clone(),
            });
            existing.push(entry.clone());
        }
        Ok(())
    }
}
