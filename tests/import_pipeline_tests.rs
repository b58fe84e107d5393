//! Bulk Import Pipeline Integration Tests
//!
//! Drives the orchestrator end to end against the in-process chain.
//!
//! Test categories:
//! - Full imports and resulting ledger state
//! - Resume after a failed broadcast
//! - Resume after an interruption while waiting for commit
//! - Resumed runs matching an uninterrupted run on mixed records
//! - Gas-driven chunk splitting
//!
//! Run with:
//!   cargo test --test import_pipeline_tests -- --nocapture

mod common;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use asset_ledger::import::{
    BroadcastResult, Broadcaster, ChunkConfig, CommitWaitConfig, CommitWatcher, ImportOrchestrator, ImportSession,
    ImportState, LocalChain, RecordCursor, SessionPlan, Simulator, StatusStore, TxStatus,
};
use asset_ledger::types::{BucketBalance, ImportChunk, LedgerKey, LedgerToEntries, MsgBulkImport};
use common::{entry_ids, record_entry_ids, setup_chain, write_import_file, write_import_records};

// =============================================================================
// Helper Functions
// =============================================================================

/// Wraps a chain to inject one failure: a broadcast error, or a broadcast
/// that lands while the signer's sequence appears stuck.
struct FlakyChain {
    inner: Arc<LocalChain>,
    fail_broadcast_at: Option<usize>,
    stall_after: Option<usize>,
    broadcasts: AtomicUsize,
    frozen_sequence: Mutex<Option<u64>>,
}

impl FlakyChain {
    fn new(inner: Arc<LocalChain>) -> Self {
        Self {
            inner,
            fail_broadcast_at: None,
            stall_after: None,
            broadcasts: AtomicUsize::new(0),
            frozen_sequence: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl Simulator for FlakyChain {
    async fn simulate(&self, msg: &MsgBulkImport) -> Result<u64> {
        self.inner.simulate(msg).await
    }
}

#[async_trait::async_trait]
impl Broadcaster for FlakyChain {
    async fn broadcast(&self, msg: &MsgBulkImport, gas_limit: u64) -> Result<BroadcastResult> {
        let n = self.broadcasts.fetch_add(1, Ordering::SeqCst);
        if self.fail_broadcast_at == Some(n) {
            return Err(anyhow!("connection reset by peer"));
        }
        if self.stall_after == Some(n) {
            let sequence = self.inner.account_sequence().await?;
            *self.frozen_sequence.lock() = Some(sequence);
        }
        self.inner.broadcast(msg, gas_limit).await
    }
}

#[async_trait::async_trait]
impl CommitWatcher for FlakyChain {
    async fn account_sequence(&self) -> Result<u64> {
        let frozen = *self.frozen_sequence.lock();
        match frozen {
            Some(sequence) => Ok(sequence),
            None => self.inner.account_sequence().await,
        }
    }

    async fn tx_status(&self, tx_hash: &str) -> Result<TxStatus> {
        self.inner.tx_status(tx_hash).await
    }
}

fn orchestrator<C>(dir: &Path, config: ChunkConfig, chain: Arc<C>) -> ImportOrchestrator
where
    C: Simulator + Broadcaster + CommitWatcher + 'static,
{
    ImportOrchestrator::for_chain(config, StatusStore::new(dir), chain, common::AUTHORITY)
        .with_commit_wait(CommitWaitConfig::immediate())
}

async fn ready(orch: &ImportOrchestrator, file: &Path, import_id: &str) -> Result<ImportSession> {
    match orch.prepare(file, Some(import_id)).await? {
        SessionPlan::Ready(session) => Ok(session),
        SessionPlan::AlreadyCompleted(_) => Err(anyhow!("import {} already completed", import_id)),
    }
}

/// Correlation ids stored on chain for ledgers `nft-0..nft-{ledgers}`.
fn stored_ids(chain: &LocalChain, ledgers: usize) -> Result<Vec<String>> {
    let keeper = chain.keeper();
    let mut ids = Vec::new();
    for i in 0..ledgers {
        let key = LedgerKey::new("asset-1", format!("nft-{}", i));
        ids.extend(
            keeper
                .list_ledger_entries(&key)?
                .into_iter()
                .map(|e| e.correlation_id),
        );
    }
    Ok(ids)
}

/// Chunk bound of roughly three records.
fn small_chunks() -> ChunkConfig {
    ChunkConfig::with_chunk_size(3 * serde_json::to_vec(&common::record_json(0, 3)).map_or(0, |v| v.len()))
}

/// Chunk bound that exactly fits the first `n` records of an import file
/// shaped like `entries`.
fn bound_for(entries: &[usize], n: usize) -> Result<ChunkConfig> {
    let records = entries[..n]
        .iter()
        .enumerate()
        .map(|(i, &e)| serde_json::from_value(common::record_json(i, e)))
        .collect::<std::result::Result<Vec<LedgerToEntries>, _>>()?;
    Ok(ChunkConfig::with_chunk_size(ImportChunk::new(records).size_bytes()?))
}

// =============================================================================
// Full Import Tests
// =============================================================================

#[tokio::test]
async fn test_full_import_builds_ledgers_and_balances() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 10, 3)?;
    let chain = Arc::new(setup_chain(10)?);
    let orch = orchestrator(temp_dir.path(), small_chunks(), chain.clone());

    let report = orch.run(ready(&orch, &file, "import_full").await?).await?;
    assert!(report.chunks_submitted >= 3);

    let status = orch.status_store().require("import_full")?;
    assert_eq!(status.status, ImportState::Completed);
    assert_eq!(status.completed_chunks, status.total_chunks);
    assert_eq!(status.total_ledgers, 10);
    assert_eq!(status.total_entries, 30);
    assert_eq!(status.last_successful_correlation_id.as_deref(), Some("l9-e2"));

    assert_eq!(stored_ids(&chain, 10)?, entry_ids(10, 3));
    let keeper = chain.keeper();
    let key = LedgerKey::new("asset-1", "nft-4");
    assert_eq!(keeper.require_get_ledger(&key)?.interest_rate, 5_000_000);
    assert_eq!(keeper.balances_as_of(&key, 19_001)?, vec![BucketBalance::new(1, 800i64)]);
    assert_eq!(keeper.balances_as_of(&key, 19_010)?, vec![BucketBalance::new(1, 700i64)]);
    Ok(())
}

#[tokio::test]
async fn test_plan_matches_submitted_chunks() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 10, 3)?;
    let chain = Arc::new(setup_chain(10)?);
    let orch = orchestrator(temp_dir.path(), small_chunks(), chain.clone());

    let plan = orch.plan(&file).await?;
    assert!(plan.chunks.iter().all(|c| c.within_limits));
    assert!(stored_ids(&chain, 10)?.is_empty(), "planning must not import");

    let report = orch.run(ready(&orch, &file, "import_plan").await?).await?;
    assert_eq!(report.chunks_submitted, plan.chunks.len());
    assert_eq!(plan.total_entries, 30);
    Ok(())
}

// =============================================================================
// Resume Tests
// =============================================================================

#[tokio::test]
async fn test_resume_after_failed_broadcast() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 10, 3)?;
    let chain = Arc::new(setup_chain(10)?);

    let flaky = Arc::new(FlakyChain {
        fail_broadcast_at: Some(2),
        ..FlakyChain::new(chain.clone())
    });
    let orch = orchestrator(temp_dir.path(), small_chunks(), flaky);
    let err = orch.run(ready(&orch, &file, "import_retry").await?).await.unwrap_err();
    assert!(err.to_string().contains("failed to process chunk 2"), "{}", err);

    let failed = orch.status_store().require("import_retry")?;
    assert_eq!(failed.status, ImportState::Failed);
    assert_eq!(failed.completed_chunks, 2);
    let committed = stored_ids(&chain, 10)?;
    assert_eq!(
        failed.last_successful_correlation_id.as_deref(),
        committed.last().map(String::as_str)
    );

    let orch = orchestrator(temp_dir.path(), small_chunks(), chain.clone());
    orch.run(ready(&orch, &file, "import_retry").await?).await?;

    // Same end state as an uninterrupted run.
    assert_eq!(stored_ids(&chain, 10)?, entry_ids(10, 3));
    let done = orch.status_store().require("import_retry")?;
    assert_eq!(done.status, ImportState::Completed);
    assert_eq!(done.gas_costs, failed.gas_costs);
    assert!(done.error_message.is_none());
    Ok(())
}

#[tokio::test]
async fn test_resume_reconciles_chunk_committed_during_interruption() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 10, 3)?;
    let chain = Arc::new(setup_chain(10)?);

    let stalled = Arc::new(FlakyChain {
        stall_after: Some(1),
        ..FlakyChain::new(chain.clone())
    });
    let orch = orchestrator(temp_dir.path(), small_chunks(), stalled);
    let err = orch.run(ready(&orch, &file, "import_stall").await?).await.unwrap_err();
    assert!(err.to_string().contains("failed to wait for transaction confirmation for chunk 1"));

    let status = orch.status_store().require("import_stall")?;
    let attempt = status.last_attempted_chunk.clone().ok_or_else(|| anyhow!("no attempt recorded"))?;
    assert!(!attempt.confirmed);
    assert_eq!(status.completed_chunks, 1);

    // The chunk did land; resuming must not submit it again.
    let orch = orchestrator(temp_dir.path(), small_chunks(), chain.clone());
    let session = ready(&orch, &file, "import_stall").await?;
    assert_eq!(session.status.completed_chunks, 2);
    assert_eq!(session.resume_from(), attempt.last_correlation_id.as_deref());
    orch.run(session).await?;

    assert_eq!(stored_ids(&chain, 10)?, entry_ids(10, 3));
    Ok(())
}

#[tokio::test]
async fn test_resume_skips_committed_ledger_only_record() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let shape = [1, 0, 6];
    let file = write_import_records(temp_dir.path(), &shape)?;
    let config = bound_for(&shape, 2)?;
    let chain = Arc::new(setup_chain(3)?);

    let flaky = Arc::new(FlakyChain {
        fail_broadcast_at: Some(1),
        ..FlakyChain::new(chain.clone())
    });
    let orch = orchestrator(temp_dir.path(), config, flaky);
    let err = orch.run(ready(&orch, &file, "import_gap").await?).await.unwrap_err();
    assert!(err.to_string().contains("failed to process chunk 1 [l2-e0..l2-e5]"), "{}", err);

    // Chunk 0 ended with nft-1, which has no entry of its own.
    let failed = orch.status_store().require("import_gap")?;
    assert_eq!(failed.completed_chunks, 1);
    assert_eq!(failed.last_successful_correlation_id.as_deref(), Some("l0-e0"));
    assert_eq!(failed.resume_cursor, Some(RecordCursor::new(2, 0)));
    assert!(chain.keeper().has_ledger(&LedgerKey::new("asset-1", "nft-1"))?);

    let orch = orchestrator(temp_dir.path(), config, chain.clone());
    let session = ready(&orch, &file, "import_gap").await?;
    assert_eq!(session.remaining_chunks(), 1);
    let report = orch.run(session).await?;
    assert_eq!(report.chunks_submitted, 1);
    assert_eq!(report.status.status, ImportState::Completed);
    assert_eq!(stored_ids(&chain, 3)?, record_entry_ids(&shape));
    Ok(())
}

#[tokio::test]
async fn test_interrupted_imports_match_uninterrupted_run() -> Result<()> {
    // Chunk 0 holds the first two records and so ends on a ledger-only one.
    let shape = [2, 0, 3, 0, 0, 2, 1];
    let config = bound_for(&shape, 2)?;

    let baseline_dir = TempDir::new()?;
    let file = write_import_records(baseline_dir.path(), &shape)?;
    let baseline = Arc::new(setup_chain(shape.len())?);
    let orch = orchestrator(baseline_dir.path(), config, baseline.clone());
    let chunks = orch.plan(&file).await?.chunks.len();
    assert!(chunks >= 3, "{} chunks", chunks);
    orch.run(ready(&orch, &file, "import_mixed").await?).await?;
    let expected = baseline.keeper().export_genesis()?;
    assert_eq!(expected.ledgers.len(), shape.len());
    assert_eq!(stored_ids(&baseline, shape.len())?, record_entry_ids(&shape));

    for interrupt_at in 0..chunks {
        for stall in [false, true] {
            let temp_dir = TempDir::new()?;
            let file = write_import_records(temp_dir.path(), &shape)?;
            let chain = Arc::new(setup_chain(shape.len())?);
            let flaky = FlakyChain::new(chain.clone());
            let flaky = Arc::new(if stall {
                FlakyChain {
                    stall_after: Some(interrupt_at),
                    ..flaky
                }
            } else {
                FlakyChain {
                    fail_broadcast_at: Some(interrupt_at),
                    ..flaky
                }
            });
            let orch = orchestrator(temp_dir.path(), config, flaky);
            assert!(orch.run(ready(&orch, &file, "import_mixed").await?).await.is_err());

            let orch = orchestrator(temp_dir.path(), config, chain.clone());
            let report = orch.run(ready(&orch, &file, "import_mixed").await?).await?;
            assert_eq!(report.status.status, ImportState::Completed);
            assert_eq!(
                chain.keeper().export_genesis()?,
                expected,
                "interrupted at chunk {} (stalled: {})",
                interrupt_at,
                stall
            );
        }
    }
    Ok(())
}

#[tokio::test]
async fn test_completed_import_is_not_rerun() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 2, 2)?;
    let chain = Arc::new(setup_chain(2)?);
    let orch = orchestrator(temp_dir.path(), ChunkConfig::default(), chain.clone());
    orch.run(ready(&orch, &file, "import_once").await?).await?;

    match orch.prepare(&file, Some("import_once")).await? {
        SessionPlan::AlreadyCompleted(status) => assert_eq!(status.total_entries, 4),
        SessionPlan::Ready(_) => panic!("completed import was prepared again"),
    }
    Ok(())
}

// =============================================================================
// Gas Bound Tests
// =============================================================================

#[tokio::test]
async fn test_records_over_gas_budget_are_split() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file = write_import_file(temp_dir.path(), 3, 30)?;
    let chain = Arc::new(setup_chain(3)?);
    let config = ChunkConfig {
        max_gas_per_tx: 400_000,
        ..ChunkConfig::default()
    };
    let orch = orchestrator(temp_dir.path(), config, chain.clone());

    let session = ready(&orch, &file, "import_split").await?;
    let costs = session.costs;
    assert!(costs.ledger_with_key_gas > 0 && costs.entry_gas > 0);
    // A whole record would not fit one transaction.
    assert!(costs.ledger_with_key_gas + 30 * costs.entry_gas > config.gas_budget());

    let report = orch.run(session).await?;
    assert!(report.chunks_submitted > 3);
    assert_eq!(stored_ids(&chain, 3)?, entry_ids(3, 30));
    Ok(())
}
