//! Bulk import payloads.

use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::model::{Ledger, LedgerEntry, LedgerKey};

/// One ledger's worth of import data.
///
/// `ledger` is present when the ledger still has to be created; a record without
/// it appends to a ledger that already exists (created by an earlier chunk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerToEntries {
    #[serde(alias = "ledger_key")]
    pub ledger_key: LedgerKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<Ledger>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
}

impl LedgerToEntries {
    pub fn new(ledger_key: LedgerKey, ledger: Option<Ledger>, entries: Vec<LedgerEntry>) -> Self {
        Self {
            ledger_key,
            ledger,
            entries,
        }
    }

    pub fn has_ledger(&self) -> bool {
        self.ledger.is_some()
    }
}

/// A bounded group of import records submitted as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportChunk {
    #[serde(default, alias = "ledger_to_entries")]
    pub ledger_to_entries: Vec<LedgerToEntries>,
}

impl ImportChunk {
    pub fn new(ledger_to_entries: Vec<LedgerToEntries>) -> Self {
        Self { ledger_to_entries }
    }

    pub fn is_empty(&self) -> bool {
        self.ledger_to_entries.is_empty()
    }

    /// Number of records (ledger keys) in the chunk.
    pub fn ledger_count(&self) -> usize {
        self.ledger_to_entries.len()
    }

    pub fn entry_count(&self) -> usize {
        self.ledger_to_entries.iter().map(|r| r.entries.len()).sum()
    }

    /// Length of the compact JSON encoding.
    pub fn size_bytes(&self) -> LedgerResult<usize> {
        Ok(serde_json::to_vec(self)?.len())
    }

    pub fn first_correlation_id(&self) -> Option<&str> {
        self.ledger_to_entries
            .iter()
            .flat_map(|r| r.entries.first())
            .map(|e| e.correlation_id.as_str())
            .next()
    }

    pub fn last_correlation_id(&self) -> Option<&str> {
        self.ledger_to_entries
            .iter()
            .rev()
            .flat_map(|r| r.entries.last())
            .map(|e| e.correlation_id.as_str())
            .next()
    }

    /// First and last correlation ids in file order, if the chunk has any entries.
    pub fn correlation_range(&self) -> Option<(&str, &str)> {
        Some((self.first_correlation_id()?, self.last_correlation_id()?))
    }
}

/// Bulk import message: the chunk plus the signing authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsgBulkImport {
    pub authority: String,
    #[serde(flatten)]
    pub chunk: ImportChunk,
}

impl MsgBulkImport {
    pub fn new(authority: impl Into<String>, chunk: ImportChunk) -> Self {
        Self {
            authority: authority.into(),
            chunk,
        }
    }
}
