//! In-process chain for running imports without a network.
//!
//! [`LocalChain`] executes bulk import messages against a [`Keeper`] backed
//! by an in-memory store, meters store access with a KV gas schedule and
//! keeps an account sequence and a transaction log. Its state can be
//! persisted to a JSON file and reopened, so an interrupted import can be
//! resumed against the same chain.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use ledger_keeper::{EntryStore, Keeper, LedgerGenesis, MemRegistry, MemStore, MsgServer, RegistryState};
use ledger_types::{LedgerError, LedgerResult, MsgBulkImport};

use crate::oracle::{BroadcastResult, Broadcaster, CommitWatcher, Simulator, TxStatus};
use crate::paths::atomic_write_json_pretty;

/// Store access costs, per operation and per byte of key plus value.
pub mod gas_schedule {
    pub const HAS: u64 = 1_000;
    pub const DELETE: u64 = 1_000;
    pub const READ_FLAT: u64 = 1_000;
    pub const READ_PER_BYTE: u64 = 3;
    pub const WRITE_FLAT: u64 = 2_000;
    pub const WRITE_PER_BYTE: u64 = 30;
    pub const ITER_NEXT: u64 = 30;
    pub const TX_BASE: u64 = 20_000;
    pub const TX_SIZE_PER_BYTE: u64 = 10;
}

/// Result code for a transaction that ran out of gas.
pub const CODE_OUT_OF_GAS: u32 = 11;

#[derive(Debug)]
struct GasMeter {
    limit: u64,
    used: u64,
    exhausted: bool,
}

impl GasMeter {
    fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            exhausted: false,
        }
    }

    fn consume(&mut self, amount: u64, descriptor: &str) -> LedgerResult<()> {
        self.used = self.used.saturating_add(amount);
        if self.used > self.limit {
            self.exhausted = true;
            return Err(LedgerError::internal(format!("out of gas in location: {}", descriptor)));
        }
        Ok(())
    }
}

/// Store wrapper charging every access to a shared meter.
struct GasMeteredStore {
    inner: Arc<MemStore>,
    meter: Arc<Mutex<GasMeter>>,
}

impl GasMeteredStore {
    fn charge(&self, amount: u64, descriptor: &str) -> LedgerResult<()> {
        self.meter.lock().consume(amount, descriptor)
    }
}

impl EntryStore for GasMeteredStore {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        self.charge(gas_schedule::READ_FLAT, "ReadFlat")?;
        let value = self.inner.get(key)?;
        let bytes = key.len() + value.as_ref().map_or(0, Vec::len);
        self.charge(gas_schedule::READ_PER_BYTE * bytes as u64, "ReadPerByte")?;
        Ok(value)
    }

    fn set(&self, key: &[u8], value: Vec<u8>) -> LedgerResult<()> {
        self.charge(gas_schedule::WRITE_FLAT, "WriteFlat")?;
        self.charge(
            gas_schedule::WRITE_PER_BYTE * (key.len() + value.len()) as u64,
            "WritePerByte",
        )?;
        self.inner.set(key, value)
    }

    fn has(&self, key: &[u8]) -> LedgerResult<bool> {
        self.charge(gas_schedule::HAS, "Has")?;
        self.inner.has(key)
    }

    fn delete(&self, key: &[u8]) -> LedgerResult<()> {
        self.charge(gas_schedule::DELETE, "Delete")?;
        self.inner.delete(key)
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.charge(gas_schedule::READ_FLAT, "IterInit")?;
        let items = self.inner.iterate_prefix(prefix)?;
        for (k, v) in &items {
            self.charge(gas_schedule::ITER_NEXT, "IterNextFlat")?;
            self.charge(gas_schedule::READ_PER_BYTE * (k.len() + v.len()) as u64, "ReadPerByte")?;
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub code: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw_log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
}

/// Everything needed to reopen a [`LocalChain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainState {
    pub authority: String,
    /// Logical date in days since epoch.
    pub block_date: i32,
    pub account_sequence: u64,
    pub registry: RegistryState,
    pub genesis: LedgerGenesis,
    pub txs: BTreeMap<String, TxRecord>,
}

struct ChainInner {
    store: Arc<MemStore>,
    registry: Arc<MemRegistry>,
    block_date: i32,
    account_sequence: u64,
    txs: BTreeMap<String, TxRecord>,
}

pub struct LocalChain {
    path: Option<PathBuf>,
    authority: String,
    inner: Mutex<ChainInner>,
}

impl LocalChain {
    /// Empty in-memory chain.
    pub fn new(authority: impl Into<String>, block_date: i32) -> Self {
        Self {
            path: None,
            authority: authority.into(),
            inner: Mutex::new(ChainInner {
                store: Arc::new(MemStore::new()),
                registry: Arc::new(MemRegistry::new()),
                block_date,
                account_sequence: 0,
                txs: BTreeMap::new(),
            }),
        }
    }

    pub fn from_state(state: ChainState, path: Option<PathBuf>) -> Result<Self> {
        let store = Arc::new(MemStore::new());
        let registry = Arc::new(MemRegistry::from_state(state.registry));
        Keeper::new(store.clone(), registry.clone(), state.authority.clone())
            .with_block_date(state.block_date)
            .init_genesis(&state.genesis)
            .map_err(|e| anyhow!("Failed to load chain genesis: {}", e))?;

        Ok(Self {
            path,
            authority: state.authority,
            inner: Mutex::new(ChainInner {
                store,
                registry,
                block_date: state.block_date,
                account_sequence: state.account_sequence,
                txs: state.txs,
            }),
        })
    }

    /// Open a chain state file; changes are written back to it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("chain state file {} not found", path.display()));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read chain state {}: {}", path.display(), e))?;
        let state: ChainState = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse chain state {}: {}", path.display(), e))?;
        info!(
            path = %path.display(),
            sequence = state.account_sequence,
            ledgers = state.genesis.ledgers.len(),
            "opened local chain"
        );
        Self::from_state(state, Some(path.to_path_buf()))
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn registry(&self) -> Arc<MemRegistry> {
        self.inner.lock().registry.clone()
    }

    /// Keeper over the committed state, for queries and setup.
    pub fn keeper(&self) -> Keeper {
        let inner = self.inner.lock();
        Keeper::new(inner.store.clone(), inner.registry.clone(), self.authority.clone())
            .with_block_date(inner.block_date)
    }

    pub fn to_state(&self) -> Result<ChainState> {
        let genesis = self
            .keeper()
            .export_genesis()
            .map_err(|e| anyhow!("Failed to export chain state: {}", e))?;
        let inner = self.inner.lock();
        Ok(ChainState {
            authority: self.authority.clone(),
            block_date: inner.block_date,
            account_sequence: inner.account_sequence,
            registry: inner.registry.to_state(),
            genesis,
            txs: inner.txs.clone(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        atomic_write_json_pretty(path, &self.to_state()?)
    }

    /// Write back to the file the chain was opened from, if any.
    pub fn save(&self) -> Result<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    /// Run `msg` on a copy of the committed store. Returns the copy so a
    /// successful broadcast can adopt it.
    fn execute(&self, msg: &MsgBulkImport, gas_limit: u64) -> Result<(Arc<MemStore>, TxRecord)> {
        let (scratch, registry, block_date) = {
            let inner = self.inner.lock();
            (Arc::new(inner.store.snapshot()), inner.registry.clone(), inner.block_date)
        };

        let meter = Arc::new(Mutex::new(GasMeter::new(gas_limit)));
        let tx_bytes = serde_json::to_vec(msg).map_err(|e| anyhow!("Failed to encode message: {}", e))?;
        let intrinsic = gas_schedule::TX_BASE + gas_schedule::TX_SIZE_PER_BYTE * tx_bytes.len() as u64;

        let charged = meter.lock().consume(intrinsic, "txSize");
        let result = charged.and_then(|()| {
            let store = Arc::new(GasMeteredStore {
                inner: scratch.clone(),
                meter: meter.clone(),
            });
            let keeper = Keeper::new(store, registry, self.authority.clone()).with_block_date(block_date);
            MsgServer::new(&keeper).bulk_import(msg)
        });

        let gas = meter.lock();
        let record = match result {
            Ok(outcome) => {
                debug!(
                    ledgers = outcome.ledgers_created,
                    entries = outcome.entries_appended,
                    gas_used = gas.used,
                    "executed bulk import"
                );
                TxRecord {
                    code: 0,
                    raw_log: String::new(),
                    gas_wanted: gas_limit,
                    gas_used: gas.used,
                }
            }
            Err(e) if gas.exhausted => TxRecord {
                code: CODE_OUT_OF_GAS,
                raw_log: format!("{}; gasWanted: {}, gasUsed: {}: out of gas", e, gas_limit, gas.used),
                gas_wanted: gas_limit,
                gas_used: gas.used,
            },
            Err(e) => TxRecord {
                code: e.code(),
                raw_log: e.to_string(),
                gas_wanted: gas_limit,
                gas_used: gas.used,
            },
        };
        Ok((scratch, record))
    }

    fn tx_hash(msg: &MsgBulkImport, sequence: u64) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(msg).map_err(|e| anyhow!("Failed to encode message: {}", e))?);
        hasher.update(sequence.to_be_bytes());
        Ok(hex::encode_upper(hasher.finalize()))
    }
}

#[async_trait::async_trait]
impl Simulator for LocalChain {
    async fn simulate(&self, msg: &MsgBulkImport) -> Result<u64> {
        let (_, record) = self.execute(msg, u64::MAX)?;
        if record.code != 0 {
            return Err(anyhow!("simulation failed with code {}: {}", record.code, record.raw_log));
        }
        Ok(record.gas_used)
    }
}

#[async_trait::async_trait]
impl Broadcaster for LocalChain {
    async fn broadcast(&self, msg: &MsgBulkImport, gas_limit: u64) -> Result<BroadcastResult> {
        let (scratch, record) = self.execute(msg, gas_limit)?;
        let tx_hash = {
            let mut inner = self.inner.lock();
            let tx_hash = Self::tx_hash(msg, inner.account_sequence)?;
            if record.code == 0 {
                inner.store.restore_from(&scratch);
                inner.account_sequence += 1;
            } else {
                warn!(code = record.code, raw_log = %record.raw_log, "transaction rejected");
            }
            inner.txs.insert(tx_hash.clone(), record.clone());
            tx_hash
        };
        self.save()?;

        Ok(BroadcastResult {
            code: record.code,
            raw_log: record.raw_log,
            tx_hash,
        })
    }
}

#[async_trait::async_trait]
impl CommitWatcher for LocalChain {
    async fn account_sequence(&self) -> Result<u64> {
        Ok(self.inner.lock().account_sequence)
    }

    async fn tx_status(&self, tx_hash: &str) -> Result<TxStatus> {
        Ok(match self.inner.lock().txs.get(tx_hash) {
            Some(record) if record.code == 0 => TxStatus::Committed,
            Some(record) => TxStatus::Failed(record.raw_log.clone()),
            None => TxStatus::Unknown,
        })
    }
}
