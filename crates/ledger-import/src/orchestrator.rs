//! End-to-end driver for one resumable bulk import.
//!
//! [`ImportOrchestrator::prepare`] loads or creates the status for an import
//! id, reconciles a chunk left unconfirmed by an interrupted run and settles
//! the gas model. [`ImportOrchestrator::run`] then streams the file from the
//! resume point and submits chunks strictly one at a time: each broadcast
//! must be observed committed before the next is built.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use ledger_types::{ImportChunk, MsgBulkImport};

use crate::chunker::{RecordCursor, StreamingChunker};
use crate::config::{ChunkConfig, CommitWaitConfig};
use crate::correlation::{cursor_after_correlation_id_in_file, find_next_correlation_id_in_file};
use crate::gas::{GasCostEstimator, GasCosts, MAX_ESTIMATION_CHUNKS};
use crate::optimizer::ChunkOptimizer;
use crate::oracle::{Broadcaster, CommitWatcher, Simulator, TxStatus};
use crate::status::{BulkImportStatus, ChunkAttempt, ImportState, StatusStore};

/// SHA-256 of a file's contents, hex encoded.
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)
        .map_err(|e| anyhow!("Failed to hash {}: {}", path.display(), e))?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn generate_import_id() -> String {
    format!("import_{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// `chunk 3 [c10..c19]`, for error messages.
fn describe_chunk(index: usize, chunk: &ImportChunk) -> String {
    match chunk.correlation_range() {
        Some((first, last)) => format!("chunk {} [{}..{}]", index, first, last),
        None => format!("chunk {}", index),
    }
}

/// Follows submitted pieces back to positions in the input. Pieces come
/// out of the optimizer in input order and a record is either whole or
/// split across consecutive pieces, so entry counts are enough to tell
/// where each piece ends.
struct CursorTracker {
    cursor: RecordCursor,
    /// Entries not yet submitted, per record read but not finished.
    pending: VecDeque<usize>,
}

impl CursorTracker {
    fn new(start: RecordCursor) -> Self {
        Self {
            cursor: start,
            pending: VecDeque::new(),
        }
    }

    fn read(&mut self, raw: &ImportChunk) {
        self.pending
            .extend(raw.ledger_to_entries.iter().map(|r| r.entries.len()));
    }

    /// Position after `piece`, once it is committed.
    fn advance(&mut self, piece: &ImportChunk) -> Result<RecordCursor> {
        for record in &piece.ledger_to_entries {
            let left = self
                .pending
                .front_mut()
                .ok_or_else(|| anyhow!("record {} was never read from the input", record.ledger_key))?;
            *left = left
                .checked_sub(record.entries.len())
                .ok_or_else(|| anyhow!("record {} has more entries than the input", record.ledger_key))?;
            if *left == 0 {
                self.pending.pop_front();
                self.cursor = RecordCursor::new(self.cursor.records + 1, 0);
            } else {
                self.cursor.entries += record.entries.len();
            }
        }
        Ok(self.cursor)
    }
}

/// State carried from [`ImportOrchestrator::prepare`] into
/// [`ImportOrchestrator::run`].
#[derive(Debug, Clone)]
pub struct ImportSession {
    pub file: PathBuf,
    pub status: BulkImportStatus,
    pub costs: GasCosts,
}

impl ImportSession {
    pub fn import_id(&self) -> &str {
        &self.status.import_id
    }

    pub fn resume_from(&self) -> Option<&str> {
        self.status.last_successful_correlation_id.as_deref()
    }

    pub fn resume_cursor(&self) -> RecordCursor {
        self.status.resume_cursor.unwrap_or_default()
    }

    pub fn remaining_chunks(&self) -> usize {
        self.status.total_chunks.saturating_sub(self.status.completed_chunks)
    }
}

#[derive(Debug)]
pub enum SessionPlan {
    /// The import id already finished; nothing to do.
    AlreadyCompleted(BulkImportStatus),
    Ready(ImportSession),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub import_id: String,
    pub chunks_submitted: usize,
    pub status: BulkImportStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedChunk {
    pub index: usize,
    pub records: usize,
    /// Records that create their ledger.
    pub ledgers: usize,
    pub entries: usize,
    /// Serialized size of the full message.
    pub size_bytes: usize,
    pub estimated_gas: u64,
    pub within_limits: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_correlation_id: Option<String>,
}

/// What an import would submit, without submitting anything.
#[derive(Debug, Clone, Serialize)]
pub struct ImportPlan {
    pub file_hash: String,
    pub gas_costs: GasCosts,
    pub gas_budget: u64,
    pub max_tx_size_bytes: usize,
    pub total_ledgers: usize,
    pub total_entries: usize,
    pub chunks: Vec<PlannedChunk>,
}

pub struct ImportOrchestrator {
    config: ChunkConfig,
    wait: CommitWaitConfig,
    status_store: StatusStore,
    simulator: Arc<dyn Simulator>,
    broadcaster: Arc<dyn Broadcaster>,
    watcher: Arc<dyn CommitWatcher>,
    authority: String,
}

impl ImportOrchestrator {
    pub fn new(
        config: ChunkConfig,
        status_store: StatusStore,
        simulator: Arc<dyn Simulator>,
        broadcaster: Arc<dyn Broadcaster>,
        watcher: Arc<dyn CommitWatcher>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            config,
            wait: CommitWaitConfig::default(),
            status_store,
            simulator,
            broadcaster,
            watcher,
            authority: authority.into(),
        }
    }

    /// One chain object serving as simulator, broadcaster and watcher.
    pub fn for_chain<C>(config: ChunkConfig, status_store: StatusStore, chain: Arc<C>, authority: impl Into<String>) -> Self
    where
        C: Simulator + Broadcaster + CommitWatcher + 'static,
    {
        Self::new(config, status_store, chain.clone(), chain.clone(), chain, authority)
    }

    pub fn with_commit_wait(mut self, wait: CommitWaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status_store
    }

    fn open_chunker(&self, file: &Path, cursor: RecordCursor) -> Result<StreamingChunker<BufReader<File>>> {
        Ok(StreamingChunker::open_file(file, &self.config, None)?.resume_at(cursor))
    }

    /// Estimate from the first chunks after `cursor`; any estimation
    /// failure falls back to the default model.
    async fn estimate_costs(&self, file: &Path, cursor: RecordCursor) -> Result<GasCosts> {
        let sample = self
            .open_chunker(file, cursor)?
            .take(MAX_ESTIMATION_CHUNKS)
            .collect::<Result<Vec<_>>>()?;
        let estimator = GasCostEstimator::new(self.simulator.clone(), self.authority.clone());
        match estimator.estimate(&sample).await {
            Ok(costs) => Ok(costs),
            Err(e) => {
                warn!(error = %e, "gas estimation failed, using fallback gas costs");
                Ok(GasCosts::FALLBACK)
            }
        }
    }

    /// Look up an unconfirmed broadcast from an earlier run by its hash.
    async fn reconcile(&self, status: &mut BulkImportStatus) -> Result<()> {
        let Some(attempt) = status.last_attempted_chunk.clone().filter(|a| !a.confirmed) else {
            return Ok(());
        };
        let outcome = self
            .watcher
            .tx_status(&attempt.transaction_hash)
            .await
            .map_err(|e| anyhow!("failed to query transaction {}: {}", attempt.transaction_hash, e))?;
        match outcome {
            TxStatus::Committed => {
                info!(
                    chunk = attempt.chunk_index,
                    tx_hash = %attempt.transaction_hash,
                    "unconfirmed chunk from previous run was committed"
                );
                status.confirm_last_attempt();
            }
            TxStatus::Failed(log) => {
                warn!(
                    chunk = attempt.chunk_index,
                    tx_hash = %attempt.transaction_hash,
                    raw_log = %log,
                    "chunk from previous run failed on chain, it will be resubmitted"
                );
            }
            TxStatus::Unknown => {
                warn!(
                    chunk = attempt.chunk_index,
                    tx_hash = %attempt.transaction_hash,
                    "chunk from previous run not found on chain, it will be resubmitted"
                );
            }
        }
        Ok(())
    }

    /// Count the chunks an import from `cursor` would submit. Reads the
    /// whole remaining file, so malformed input fails here before anything
    /// is broadcast.
    fn count_chunks(&self, file: &Path, costs: GasCosts, cursor: RecordCursor) -> Result<(usize, usize, usize)> {
        let optimizer = ChunkOptimizer::new(costs, self.config);
        let (mut chunks, mut ledgers, mut entries) = (0, 0, 0);
        for raw in self.open_chunker(file, cursor)? {
            let raw = raw?;
            ledgers += raw.ledger_count();
            entries += raw.entry_count();
            chunks += optimizer.optimize_chunk(raw)?.len();
        }
        Ok((chunks, ledgers, entries))
    }

    pub async fn prepare(&self, file: &Path, import_id: Option<&str>) -> Result<SessionPlan> {
        let file_hash = file_sha256(file)?;
        let import_id = import_id
            .map(str::to_string)
            .unwrap_or_else(generate_import_id);

        let mut status = match self.status_store.load(&import_id)? {
            Some(existing) if existing.file_hash != file_hash => {
                return Err(anyhow!(
                    "import {} was started from a different file (hash {} != {})",
                    import_id,
                    existing.file_hash,
                    file_hash
                ));
            }
            Some(existing) if existing.is_completed() => {
                info!(import_id = %import_id, "import already completed");
                return Ok(SessionPlan::AlreadyCompleted(existing));
            }
            Some(mut existing) => {
                self.reconcile(&mut existing).await?;
                info!(
                    import_id = %import_id,
                    completed_chunks = existing.completed_chunks,
                    resume_from = existing.last_successful_correlation_id.as_deref().unwrap_or(""),
                    "resuming import"
                );
                existing
            }
            None => {
                info!(import_id = %import_id, file = %file.display(), "starting new import");
                BulkImportStatus::new(import_id.clone(), file_hash)
            }
        };

        if let Some(after) = status.last_successful_correlation_id.clone() {
            match find_next_correlation_id_in_file(file, &after)? {
                Some(next) => info!(after = %after, next = %next, "next entry to import"),
                None => info!(after = %after, "no entries remain after resume point"),
            }
            // Status written before record positions were kept.
            if status.resume_cursor.is_none() {
                let cursor = cursor_after_correlation_id_in_file(file, &after)?;
                debug!(%cursor, "derived resume position from correlation id");
                status.resume_cursor = Some(cursor);
            }
        }
        let cursor = status.resume_cursor.unwrap_or_default();

        let costs = match status.gas_costs {
            Some(costs) => {
                debug!(?costs, "reusing stored gas costs");
                costs
            }
            None => self.estimate_costs(file, cursor).await?,
        };
        status.gas_costs = Some(costs);

        let (remaining, ledgers, entries) = self.count_chunks(file, costs, cursor)?;
        status.total_chunks = status.completed_chunks + remaining;
        if cursor.is_start() {
            status.total_ledgers = ledgers;
            status.total_entries = entries;
        }
        status.status = ImportState::InProgress;
        status.error_message = None;
        self.status_store.save(&mut status)?;

        Ok(SessionPlan::Ready(ImportSession {
            file: file.to_path_buf(),
            status,
            costs,
        }))
    }

    /// Record a failure in the status file and hand the error back.
    fn fail(&self, status: &mut BulkImportStatus, err: anyhow::Error) -> anyhow::Error {
        error!(import_id = %status.import_id, error = %err, "import failed");
        status.fail(err.to_string());
        if let Err(save_err) = self.status_store.save(status) {
            warn!(error = %save_err, "failed to persist failed import status");
        }
        err
    }

    pub async fn run(&self, session: ImportSession) -> Result<ImportReport> {
        let ImportSession {
            file,
            mut status,
            costs,
        } = session;
        let optimizer = ChunkOptimizer::new(costs, self.config);
        let start = status.resume_cursor.unwrap_or_default();
        let mut tracker = CursorTracker::new(start);

        let chunker = match self.open_chunker(&file, start) {
            Ok(chunker) => chunker,
            Err(e) => return Err(self.fail(&mut status, e)),
        };

        let mut index = status.completed_chunks;
        let mut submitted = 0;
        for raw in chunker {
            let raw = match raw {
                Ok(raw) => raw,
                Err(e) => return Err(self.fail(&mut status, anyhow!("failed to read chunk {}: {}", index, e))),
            };
            tracker.read(&raw);
            let pieces = match optimizer.optimize_chunk(raw) {
                Ok(pieces) => pieces,
                Err(e) => return Err(self.fail(&mut status, anyhow!("failed to optimize chunk {}: {}", index, e))),
            };
            for chunk in pieces {
                if chunk.is_empty() {
                    continue;
                }
                let cursor_after = match tracker.advance(&chunk) {
                    Ok(cursor) => cursor,
                    Err(e) => return Err(self.fail(&mut status, e)),
                };
                if let Err(e) = self.submit_chunk(&mut status, &costs, index, chunk, cursor_after).await {
                    return Err(self.fail(&mut status, e));
                }
                index += 1;
                submitted += 1;
            }
        }

        status.status = ImportState::Completed;
        status.total_chunks = status.total_chunks.max(status.completed_chunks);
        self.status_store.save(&mut status)?;
        info!(
            import_id = %status.import_id,
            chunks = status.completed_chunks,
            ledgers = status.total_ledgers,
            entries = status.total_entries,
            "import completed"
        );

        Ok(ImportReport {
            import_id: status.import_id.clone(),
            chunks_submitted: submitted,
            status,
        })
    }

    async fn submit_chunk(
        &self,
        status: &mut BulkImportStatus,
        costs: &GasCosts,
        index: usize,
        chunk: ImportChunk,
        cursor_after: RecordCursor,
    ) -> Result<()> {
        let label = describe_chunk(index, &chunk);
        let first = chunk.first_correlation_id().map(str::to_string);
        let last = chunk.last_correlation_id().map(str::to_string);
        let (ledgers, entries) = (chunk.ledger_count(), chunk.entry_count());
        let msg = MsgBulkImport::new(self.authority.clone(), chunk);

        let size = serde_json::to_vec(&msg)
            .map_err(|e| anyhow!("failed to serialize {}: {}", label, e))?
            .len();
        if size > self.config.max_tx_size_bytes {
            return Err(anyhow!(
                "{} exceeds maximum transaction size: {} bytes > {} bytes",
                label,
                size,
                self.config.max_tx_size_bytes
            ));
        }
        let gas = costs.chunk_gas(&msg.chunk);
        let budget = self.config.gas_budget();
        if gas > budget {
            return Err(anyhow!("{} exceeds maximum gas limit: {} > {}", label, gas, budget));
        }

        let prev_sequence = self
            .watcher
            .account_sequence()
            .await
            .map_err(|e| anyhow!("failed to read account sequence before {}: {}", label, e))?;

        debug!(chunk = index, ledgers, entries, size, gas, "broadcasting chunk");
        let result = self
            .broadcaster
            .broadcast(&msg, self.config.max_gas_per_tx)
            .await
            .map_err(|e| anyhow!("failed to process {}: {}", label, e))?;
        if !result.is_success() {
            return Err(anyhow!(
                "failed to process {}: code {}: {}",
                label,
                result.code,
                result.raw_log
            ));
        }

        status.last_attempted_chunk = Some(ChunkAttempt {
            chunk_index: index,
            first_correlation_id: first,
            last_correlation_id: last,
            transaction_hash: result.tx_hash.clone(),
            confirmed: false,
            cursor_after,
        });
        self.status_store.save(status)?;

        self.wait_for_commit(prev_sequence, &result.tx_hash)
            .await
            .map_err(|e| anyhow!("failed to wait for transaction confirmation for {}: {}", label, e))?;

        status.confirm_last_attempt();
        self.status_store.save(status)?;
        info!(
            chunk = index + 1,
            total = status.total_chunks,
            ledgers,
            entries,
            tx_hash = %result.tx_hash,
            "chunk committed"
        );
        Ok(())
    }

    /// Sleep twice the settle time, then poll until the signer's sequence
    /// moves past `prev_sequence`.
    async fn wait_for_commit(&self, prev_sequence: u64, tx_hash: &str) -> Result<()> {
        tokio::time::sleep(self.wait.settle_time * 2).await;

        let retries = self.wait.poll_retries.max(1);
        for attempt in 1..=retries {
            match self.watcher.account_sequence().await {
                Ok(sequence) if sequence > prev_sequence => {
                    return match self.watcher.tx_status(tx_hash).await? {
                        TxStatus::Failed(log) => Err(anyhow!("transaction {} failed: {}", tx_hash, log)),
                        TxStatus::Committed => Ok(()),
                        TxStatus::Unknown => {
                            warn!(
                                tx_hash = %tx_hash,
                                sequence,
                                prev_sequence,
                                "transaction not found after sequence advanced, treating it as committed"
                            );
                            Ok(())
                        }
                    };
                }
                Ok(sequence) => debug!(attempt, sequence, "transaction not yet committed"),
                Err(e) => debug!(attempt, error = %e, "account query failed"),
            }
            if attempt < retries {
                tokio::time::sleep(self.wait.poll_delay).await;
            }
        }
        Err(anyhow!(
            "transaction {} not committed after {} attempts",
            tx_hash,
            retries
        ))
    }

    /// Chunk, estimate and optimize without broadcasting.
    pub async fn plan(&self, file: &Path) -> Result<ImportPlan> {
        let file_hash = file_sha256(file)?;
        let costs = self.estimate_costs(file, RecordCursor::default()).await?;
        let optimizer = ChunkOptimizer::new(costs, self.config);
        let budget = self.config.gas_budget();

        let mut chunks = Vec::new();
        let (mut total_ledgers, mut total_entries) = (0, 0);
        for raw in StreamingChunker::open_file(file, &self.config, None)? {
            let raw = raw?;
            total_ledgers += raw.ledger_count();
            total_entries += raw.entry_count();

            for chunk in optimizer.optimize_chunk(raw)? {
                let estimated_gas = costs.chunk_gas(&chunk);
                let ledgers = chunk.ledger_to_entries.iter().filter(|r| r.ledger.is_some()).count();
                let entries = chunk.entry_count();
                let msg = MsgBulkImport::new(self.authority.clone(), chunk);
                let size_bytes = serde_json::to_vec(&msg)?.len();
                chunks.push(PlannedChunk {
                    index: chunks.len(),
                    records: msg.chunk.ledger_to_entries.len(),
                    ledgers,
                    entries,
                    size_bytes,
                    estimated_gas,
                    within_limits: size_bytes <= self.config.max_tx_size_bytes && estimated_gas <= budget,
                    first_correlation_id: msg.chunk.first_correlation_id().map(str::to_string),
                    last_correlation_id: msg.chunk.last_correlation_id().map(str::to_string),
                });
            }
        }

        Ok(ImportPlan {
            file_hash,
            gas_costs: costs,
            gas_budget: budget,
            max_tx_size_bytes: self.config.max_tx_size_bytes,
            total_ledgers,
            total_entries,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::BroadcastResult;
    use ledger_types::{Ledger, LedgerEntry, LedgerKey, LedgerToEntries};
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    /// Scripted chain: broadcasts commit unless told otherwise.
    #[derive(Default)]
    struct MockChain {
        fail_broadcast_at: Option<usize>,
        never_commit: bool,
        /// Commit but lose the tx records, so lookups say unknown.
        forget_txs: bool,
        submitted: Mutex<Vec<MsgBulkImport>>,
        sequence: Mutex<u64>,
        txs: Mutex<HashMap<String, TxStatus>>,
        simulations: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Simulator for MockChain {
        async fn simulate(&self, msg: &MsgBulkImport) -> Result<u64> {
            *self.simulations.lock() += 1;
            Ok(GasCosts::FALLBACK.chunk_gas(&msg.chunk) + 20_000)
        }
    }

    #[async_trait::async_trait]
    impl Broadcaster for MockChain {
        async fn broadcast(&self, msg: &MsgBulkImport, _gas_limit: u64) -> Result<BroadcastResult> {
            let mut submitted = self.submitted.lock();
            let n = submitted.len();
            if self.fail_broadcast_at == Some(n) {
                return Ok(BroadcastResult {
                    code: 18,
                    raw_log: "ledger entry already exists".into(),
                    tx_hash: String::new(),
                });
            }
            submitted.push(msg.clone());
            let tx_hash = format!("TX{}", n);
            if !self.never_commit {
                *self.sequence.lock() += 1;
                if !self.forget_txs {
                    self.txs.lock().insert(tx_hash.clone(), TxStatus::Committed);
                }
            }
            Ok(BroadcastResult {
                code: 0,
                raw_log: String::new(),
                tx_hash,
            })
        }
    }

    #[async_trait::async_trait]
    impl CommitWatcher for MockChain {
        async fn account_sequence(&self) -> Result<u64> {
            Ok(*self.sequence.lock())
        }

        async fn tx_status(&self, tx_hash: &str) -> Result<TxStatus> {
            Ok(self.txs.lock().get(tx_hash).cloned().unwrap_or(TxStatus::Unknown))
        }
    }

    impl MockChain {
        fn entry_ids(&self) -> Vec<String> {
            self.submitted
                .lock()
                .iter()
                .flat_map(|m| m.chunk.ledger_to_entries.iter())
                .flat_map(|r| r.entries.iter().map(|e| e.correlation_id.clone()))
                .collect()
        }
    }

    fn record_json(i: usize) -> serde_json::Value {
        json!({
            "ledgerKey": {"assetClassId": "asset-1", "nftId": format!("nft-{}", i)},
            "ledger": {"ledgerClassId": "class-1", "statusTypeId": 1},
            "entries": [
                {"correlationId": format!("l{}-e0", i), "entryTypeId": 1, "totalAmt": "100"},
                {"correlationId": format!("l{}-e1", i), "entryTypeId": 1, "totalAmt": "50"}
            ]
        })
    }

    /// Six two-entry records and a config that puts two in each chunk.
    fn write_input(dir: &Path) -> Result<(PathBuf, ChunkConfig)> {
        let records: Vec<_> = (0..6).map(record_json).collect();
        let path = dir.join("import.json");
        std::fs::write(&path, serde_json::to_vec(&json!({ "ledgerToEntries": records }))?)?;

        let pair: Vec<LedgerToEntries> = (0..2)
            .map(|i| serde_json::from_value(record_json(i)))
            .collect::<std::result::Result<_, _>>()?;
        Ok((path, ChunkConfig::with_chunk_size(ImportChunk::new(pair).size_bytes()?)))
    }

    fn orchestrator(dir: &Path, config: ChunkConfig, chain: Arc<MockChain>) -> ImportOrchestrator {
        ImportOrchestrator::for_chain(config, StatusStore::new(dir), chain, "authority")
            .with_commit_wait(CommitWaitConfig::immediate())
    }

    async fn ready(orch: &ImportOrchestrator, file: &Path, id: &str) -> Result<ImportSession> {
        match orch.prepare(file, Some(id)).await? {
            SessionPlan::Ready(session) => Ok(session),
            SessionPlan::AlreadyCompleted(_) => Err(anyhow!("unexpectedly completed")),
        }
    }

    fn all_ids() -> Vec<String> {
        (0..6)
            .flat_map(|i| [format!("l{}-e0", i), format!("l{}-e1", i)])
            .collect()
    }

    #[test]
    fn test_cursor_tracker_follows_split_records() -> Result<()> {
        let record = |nft: &str, ledger: bool, entries: usize| {
            LedgerToEntries::new(
                LedgerKey::new("asset-1", nft),
                ledger.then(Ledger::default),
                (0..entries)
                    .map(|j| LedgerEntry {
                        correlation_id: format!("{}-{}", nft, j),
                        ..Default::default()
                    })
                    .collect(),
            )
        };
        let piece = |records: Vec<LedgerToEntries>| ImportChunk::new(records);

        // Resumed one entry into record 4.
        let mut tracker = CursorTracker::new(RecordCursor::new(4, 1));
        tracker.read(&piece(vec![record("a", false, 3), record("b", true, 0), record("c", true, 5)]));

        assert_eq!(tracker.advance(&piece(vec![record("a", false, 2)]))?, RecordCursor::new(4, 3));
        assert_eq!(
            tracker.advance(&piece(vec![record("a", false, 1), record("b", true, 0), record("c", true, 2)]))?,
            RecordCursor::new(6, 2)
        );
        assert_eq!(tracker.advance(&piece(vec![record("c", false, 3)]))?, RecordCursor::new(7, 0));
        assert!(tracker.advance(&piece(vec![record("d", true, 1)])).is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_full_import() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;
        let chain = Arc::new(MockChain::default());
        let orch = orchestrator(temp_dir.path(), config, chain.clone());

        let session = ready(&orch, &file, "import_a").await?;
        assert_eq!(session.status.total_chunks, 3);
        let report = orch.run(session).await?;

        assert_eq!(report.chunks_submitted, 3);
        let status = orch.status_store().require("import_a")?;
        assert_eq!(status.status, ImportState::Completed);
        assert_eq!(status.completed_chunks, 3);
        assert_eq!(status.total_ledgers, 6);
        assert_eq!(status.total_entries, 12);
        assert_eq!(status.last_successful_correlation_id.as_deref(), Some("l5-e1"));
        assert_eq!(chain.entry_ids(), all_ids());

        assert!(matches!(
            orch.prepare(&file, Some("import_a")).await?,
            SessionPlan::AlreadyCompleted(_)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_broadcast_then_resume() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;

        let failing = Arc::new(MockChain {
            fail_broadcast_at: Some(1),
            ..Default::default()
        });
        let orch = orchestrator(temp_dir.path(), config, failing.clone());
        let err = orch.run(ready(&orch, &file, "import_b").await?).await.unwrap_err();
        assert!(err.to_string().contains("failed to process chunk 1 [l2-e0..l3-e1]"), "{}", err);

        let status = orch.status_store().require("import_b")?;
        assert_eq!(status.status, ImportState::Failed);
        assert_eq!(status.completed_chunks, 1);
        assert!(status.error_message.as_deref().unwrap_or("").contains("chunk 1"));

        let healthy = Arc::new(MockChain::default());
        let orch = orchestrator(temp_dir.path(), config, healthy.clone());
        let session = ready(&orch, &file, "import_b").await?;
        assert_eq!(session.resume_from(), Some("l1-e1"));
        assert_eq!(session.remaining_chunks(), 2);
        orch.run(session).await?;

        // Stored gas costs are reused rather than re-estimated.
        assert_eq!(*healthy.simulations.lock(), 0);
        let mut ids = failing.entry_ids();
        ids.extend(healthy.entry_ids());
        assert_eq!(ids, all_ids());
        let status = orch.status_store().require("import_b")?;
        assert_eq!(status.completed_chunks, 3);
        assert_eq!(status.total_entries, 12);
        Ok(())
    }

    #[tokio::test]
    async fn test_unconfirmed_chunk_is_reconciled_by_hash() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;

        let stuck = Arc::new(MockChain {
            never_commit: true,
            ..Default::default()
        });
        let orch = orchestrator(temp_dir.path(), config, stuck);
        let err = orch.run(ready(&orch, &file, "import_c").await?).await.unwrap_err();
        assert!(err.to_string().contains("failed to wait for transaction confirmation for chunk 0"));

        let status = orch.status_store().require("import_c")?;
        let attempt = status.last_attempted_chunk.clone().unwrap();
        assert_eq!(attempt.transaction_hash, "TX0");
        assert!(!attempt.confirmed);
        assert_eq!(status.completed_chunks, 0);

        // The transaction did land after all.
        let chain = Arc::new(MockChain::default());
        chain.txs.lock().insert("TX0".into(), TxStatus::Committed);
        let orch = orchestrator(temp_dir.path(), config, chain.clone());
        let session = ready(&orch, &file, "import_c").await?;
        assert_eq!(session.status.completed_chunks, 1);
        assert_eq!(session.resume_from(), Some("l1-e1"));
        orch.run(session).await?;
        assert_eq!(chain.entry_ids(), all_ids()[4..].to_vec());
        Ok(())
    }

    /// Collects formatted log output.
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
        type Writer = LogCapture;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_unknown_tx_after_sequence_advance_warns() -> Result<()> {
        let capture = LogCapture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;
        let chain = Arc::new(MockChain {
            forget_txs: true,
            ..Default::default()
        });
        let orch = orchestrator(temp_dir.path(), config, chain.clone());
        let report = orch.run(ready(&orch, &file, "import_g").await?).await?;

        // Counted as committed, but not silently.
        assert_eq!(report.status.completed_chunks, 3);
        assert_eq!(chain.entry_ids(), all_ids());
        let logs = String::from_utf8(capture.0.lock().clone())?;
        assert_eq!(logs.matches("treating it as committed").count(), 3, "{}", logs);
        assert!(logs.contains("tx_hash=TX0"), "{}", logs);
        Ok(())
    }

    #[tokio::test]
    async fn test_changed_file_is_refused() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;
        let orch = orchestrator(temp_dir.path(), config, Arc::new(MockChain::default()));
        ready(&orch, &file, "import_d").await?;

        std::fs::write(&file, r#"{"ledgerToEntries": []}"#)?;
        let err = orch.prepare(&file, Some("import_d")).await.unwrap_err();
        assert!(err.to_string().contains("different file"));
        Ok(())
    }

    #[tokio::test]
    async fn test_limit_violations_fail_closed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, _) = write_input(temp_dir.path())?;

        let tiny_gas = ChunkConfig {
            max_gas_per_tx: 150_000,
            ..ChunkConfig::default()
        };
        let chain = Arc::new(MockChain::default());
        let orch = orchestrator(temp_dir.path(), tiny_gas, chain.clone());
        let err = orch.run(ready(&orch, &file, "import_e").await?).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum gas limit"), "{}", err);
        assert!(chain.submitted.lock().is_empty());

        let tiny_tx = ChunkConfig {
            max_tx_size_bytes: 300,
            ..ChunkConfig::default()
        };
        let orch = orchestrator(temp_dir.path(), tiny_tx, Arc::new(MockChain::default()));
        let err = orch.run(ready(&orch, &file, "import_f").await?).await.unwrap_err();
        assert!(err.to_string().contains("exceeds maximum transaction size"), "{}", err);
        let status = orch.status_store().require("import_f")?;
        assert_eq!(status.status, ImportState::Failed);
        Ok(())
    }

    #[tokio::test]
    async fn test_plan_reports_every_chunk() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let (file, config) = write_input(temp_dir.path())?;
        let orch = orchestrator(temp_dir.path(), config, Arc::new(MockChain::default()));

        let plan = orch.plan(&file).await?;
        assert_eq!(plan.chunks.len(), 3);
        assert_eq!(plan.total_entries, 12);
        assert_eq!(plan.gas_costs.entry_gas, 5_000);
        assert_eq!(plan.chunks[2].last_correlation_id.as_deref(), Some("l5-e1"));
        assert!(plan.chunks.iter().all(|c| c.within_limits));
        Ok(())
    }
}
