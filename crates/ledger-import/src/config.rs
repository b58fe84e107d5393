//! Import limits and commit-wait tuning.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use ledger_types::env_utils::{env_millis_or, env_var, env_var_or};

/// Gas held back from `max_gas_per_tx` for message overhead.
pub const GAS_SAFETY_MARGIN: u64 = 100_000;

pub const DEFAULT_MAX_CHUNK_SIZE_BYTES: usize = 10_000_000;
pub const DEFAULT_MAX_GAS_PER_TX: u64 = 4_000_000;
pub const DEFAULT_MAX_TX_SIZE_BYTES: usize = 1_000_000;

/// Default chunk size used by the command line.
pub const CLI_DEFAULT_CHUNK_SIZE_BYTES: usize = 5_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_chunk_size_bytes: usize,
    pub max_gas_per_tx: u64,
    pub max_tx_size_bytes: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chunk_size_bytes: DEFAULT_MAX_CHUNK_SIZE_BYTES,
            max_gas_per_tx: DEFAULT_MAX_GAS_PER_TX,
            max_tx_size_bytes: DEFAULT_MAX_TX_SIZE_BYTES,
        }
    }
}

impl ChunkConfig {
    pub fn with_chunk_size(max_chunk_size_bytes: usize) -> Self {
        Self {
            max_chunk_size_bytes,
            ..Self::default()
        }
    }

    /// Gas available to the records of one transaction.
    pub fn gas_budget(&self) -> u64 {
        self.max_gas_per_tx.saturating_sub(GAS_SAFETY_MARGIN)
    }
}

/// How long to wait for a broadcast transaction to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitWaitConfig {
    /// Expected time for one block; the wait starts with twice this.
    pub settle_time: Duration,
    pub poll_retries: u32,
    pub poll_delay: Duration,
}

impl Default for CommitWaitConfig {
    fn default() -> Self {
        Self {
            settle_time: Duration::from_secs(3),
            poll_retries: 10,
            poll_delay: Duration::from_secs(1),
        }
    }
}

impl CommitWaitConfig {
    /// Defaults overridden by `LEDGER_IMPORT_SETTLE_MS`,
    /// `LEDGER_IMPORT_POLL_RETRIES` and `LEDGER_IMPORT_POLL_DELAY_MS`.
    pub fn from_env() -> Self {
        Self::from_env_with(Self::default())
    }

    /// Like [`from_env`](Self::from_env) over caller-chosen defaults.
    pub fn from_env_with(defaults: Self) -> Self {
        Self {
            settle_time: env_millis_or("LEDGER_IMPORT_SETTLE_MS", defaults.settle_time),
            poll_retries: env_var_or("LEDGER_IMPORT_POLL_RETRIES", defaults.poll_retries),
            poll_delay: env_millis_or("LEDGER_IMPORT_POLL_DELAY_MS", defaults.poll_delay),
        }
    }

    /// No waiting at all; for in-process chains that commit synchronously.
    pub fn immediate() -> Self {
        Self {
            settle_time: Duration::ZERO,
            poll_retries: 1,
            poll_delay: Duration::ZERO,
        }
    }
}

/// Directory holding status files: `LEDGER_IMPORT_STATUS_DIR` or the
/// current directory.
pub fn status_dir_from_env() -> PathBuf {
    env_var::<String>("LEDGER_IMPORT_STATUS_DIR")
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}
