//! Correlation id lookups over an import file.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ledger_types::LedgerToEntries;

use crate::chunker::{RecordCursor, RECORD_FIELDS};
use crate::json_stream::JsonArrayStream;

/// The id of the entry that follows `after` in file order, crossing record
/// boundaries. `None` when `after` is the last entry; an error when it does
/// not occur at all.
pub fn find_next_correlation_id_after<R: BufRead>(reader: R, after: &str) -> Result<Option<String>> {
    let mut stream = JsonArrayStream::open(reader, RECORD_FIELDS)?;
    let mut found = false;
    while let Some(raw) = stream.next_raw()? {
        let record: LedgerToEntries = serde_json::from_slice(&raw)
            .map_err(|e| anyhow!("failed to decode LedgerToEntries: {}", e))?;
        for entry in record.entries {
            if found {
                return Ok(Some(entry.correlation_id));
            }
            found = entry.correlation_id == after;
        }
    }
    if found {
        Ok(None)
    } else {
        Err(anyhow!("correlation id {:?} not found in input", after))
    }
}

pub fn find_next_correlation_id_in_file(path: &Path, after: &str) -> Result<Option<String>> {
    let file = File::open(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    find_next_correlation_id_after(BufReader::new(file), after)
}

/// The record position just past the entry `after`.
pub fn cursor_after_correlation_id<R: BufRead>(reader: R, after: &str) -> Result<RecordCursor> {
    let mut stream = JsonArrayStream::open(reader, RECORD_FIELDS)?;
    let mut index = 0;
    while let Some(raw) = stream.next_raw()? {
        let record: LedgerToEntries = serde_json::from_slice(&raw)
            .map_err(|e| anyhow!("failed to decode LedgerToEntries at index {}: {}", index, e))?;
        if let Some(pos) = record.entries.iter().position(|e| e.correlation_id == after) {
            return Ok(if pos + 1 == record.entries.len() {
                RecordCursor::new(index + 1, 0)
            } else {
                RecordCursor::new(index, pos + 1)
            });
        }
        index += 1;
    }
    Err(anyhow!("correlation id {:?} not found in input", after))
}

pub fn cursor_after_correlation_id_in_file(path: &Path, after: &str) -> Result<RecordCursor> {
    let file = File::open(path).map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
    cursor_after_correlation_id(BufReader::new(file), after)
}
