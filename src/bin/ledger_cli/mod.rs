//! Subcommands of the `asset-ledger` binary.

pub mod balances;
pub mod import;
pub mod output;
pub mod plan;
pub mod status;

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use ledger_import::config::{
    status_dir_from_env, CLI_DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_MAX_GAS_PER_TX, DEFAULT_MAX_TX_SIZE_BYTES,
};
use ledger_import::{ChunkConfig, LocalChain, StatusStore};

/// Which local chain to use and who signs for it.
#[derive(Args, Debug, Clone)]
pub struct ChainArgs {
    /// Local chain state file
    #[arg(long, default_value = "chain-state.json")]
    pub chain_state: PathBuf,

    /// Signing address (default: the chain's import authority)
    #[arg(long)]
    pub from: Option<String>,
}

impl ChainArgs {
    pub fn open(&self) -> Result<(Arc<LocalChain>, String)> {
        let chain = Arc::new(LocalChain::open(&self.chain_state)?);
        let signer = self
            .from
            .clone()
            .unwrap_or_else(|| chain.authority().to_string());
        debug!(chain_state = %self.chain_state.display(), signer = %signer, "opened local chain");
        Ok((chain, signer))
    }
}

/// Transaction limits shared by `chunked-bulk-import` and `plan`.
#[derive(Args, Debug, Clone)]
pub struct LimitArgs {
    /// Maximum gas per transaction
    #[arg(long, default_value_t = DEFAULT_MAX_GAS_PER_TX)]
    pub max_gas_per_tx: u64,

    /// Maximum serialized transaction size in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_TX_SIZE_BYTES)]
    pub max_tx_size_bytes: usize,
}

impl LimitArgs {
    pub fn config(&self, max_chunk_size_bytes: Option<usize>) -> ChunkConfig {
        ChunkConfig {
            max_chunk_size_bytes: max_chunk_size_bytes.unwrap_or(CLI_DEFAULT_CHUNK_SIZE_BYTES),
            max_gas_per_tx: self.max_gas_per_tx,
            max_tx_size_bytes: self.max_tx_size_bytes,
        }
    }
}

/// Status files live in `--status-dir`, else `LEDGER_IMPORT_STATUS_DIR`,
/// else the current directory.
pub fn status_store(dir: Option<&PathBuf>) -> StatusStore {
    StatusStore::new(dir.cloned().unwrap_or_else(status_dir_from_env))
}
