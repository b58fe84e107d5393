//! Narrow interfaces to the chain the importer talks to.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use ledger_types::MsgBulkImport;

/// Dry-run execution returning gas used.
#[async_trait::async_trait]
pub trait Simulator: Send + Sync {
    async fn simulate(&self, msg: &MsgBulkImport) -> Result<u64>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// Zero on success.
    pub code: u32,
    pub raw_log: String,
    pub tx_hash: String,
}

impl BroadcastResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[async_trait::async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(&self, msg: &MsgBulkImport, gas_limit: u64) -> Result<BroadcastResult>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Committed,
    Failed(String),
    Unknown,
}

/// Observes whether broadcast transactions have landed.
#[async_trait::async_trait]
pub trait CommitWatcher: Send + Sync {
    /// Sequence of the signing account; grows by one per committed tx.
    async fn account_sequence(&self) -> Result<u64>;

    async fn tx_status(&self, tx_hash: &str) -> Result<TxStatus>;
}
