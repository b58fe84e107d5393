//! Reshape chunks so each one fits a single transaction.
//!
//! Records keep their file order: the resume point is the last committed
//! correlation id, so every committed prefix of the output must also be a
//! prefix of the input.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

use ledger_types::{ImportChunk, LedgerToEntries};

use crate::config::ChunkConfig;
use crate::gas::GasCosts;

/// Bytes of `max_tx_size_bytes` kept free for the message envelope.
pub const TX_ENVELOPE_RESERVE: usize = 1024;

fn record_bytes(record: &LedgerToEntries) -> Result<usize> {
    serde_json::to_vec(record)
        .map(|v| v.len())
        .map_err(|e| anyhow!("failed to serialize record {}: {}", record.ledger_key, e))
}

/// Serialized size of an empty chunk.
fn chunk_overhead() -> Result<usize> {
    ImportChunk::default()
        .size_bytes()
        .map_err(|e| anyhow!("failed to size empty chunk: {}", e))
}

pub struct ChunkOptimizer {
    costs: GasCosts,
    config: ChunkConfig,
}

/// A chunk being filled, with running gas and byte totals.
struct Packer {
    records: Vec<LedgerToEntries>,
    gas: u64,
    bytes: usize,
}

impl ChunkOptimizer {
    pub fn new(costs: GasCosts, config: ChunkConfig) -> Self {
        Self { costs, config }
    }

    pub fn costs(&self) -> GasCosts {
        self.costs
    }

    fn byte_budget(&self) -> usize {
        self.config.max_tx_size_bytes.saturating_sub(TX_ENVELOPE_RESERVE)
    }

    /// Whether a chunk is within both the gas and the byte budget.
    pub fn fits(&self, chunk: &ImportChunk) -> Result<bool> {
        let bytes = chunk
            .size_bytes()
            .map_err(|e| anyhow!("failed to size chunk: {}", e))?;
        Ok(self.costs.chunk_gas(chunk) <= self.config.gas_budget() && bytes <= self.byte_budget())
    }

    fn record_fits(&self, record: &LedgerToEntries, overhead: usize) -> Result<bool> {
        Ok(self.costs.record_gas(record) <= self.config.gas_budget()
            && overhead + record_bytes(record)? <= self.byte_budget())
    }

    /// Optimize a batch, logging progress as it goes.
    pub fn optimize(&self, chunks: Vec<ImportChunk>) -> Result<Vec<ImportChunk>> {
        let total = chunks.len();
        let every = if total > 100 { 50 } else { 10 };
        let mut out = Vec::with_capacity(total);
        for (i, chunk) in chunks.into_iter().enumerate() {
            out.extend(self.optimize_chunk(chunk)?);
            if (i + 1) % every == 0 {
                info!(processed = i + 1, total, produced = out.len(), "optimizing chunks");
            }
        }
        info!(input = total, output = out.len(), "chunk optimization complete");
        Ok(out)
    }

    /// Pass a fitting chunk through unchanged; split anything else.
    pub fn optimize_chunk(&self, chunk: ImportChunk) -> Result<Vec<ImportChunk>> {
        if self.fits(&chunk)? {
            return Ok(vec![chunk]);
        }

        let overhead = chunk_overhead()?;
        let mut pieces = Vec::new();
        for record in chunk.ledger_to_entries {
            if self.record_fits(&record, overhead)? {
                pieces.push(record);
            } else {
                pieces.extend(self.split_large_record(record, overhead)?);
            }
        }

        let budget = self.config.gas_budget();
        let byte_budget = self.byte_budget();
        let mut out = Vec::new();
        let mut current = Packer {
            records: Vec::new(),
            gas: 0,
            bytes: overhead,
        };
        for piece in pieces {
            let gas = self.costs.record_gas(&piece);
            // One separator per record over-counts by a single byte.
            let bytes = record_bytes(&piece)? + 1;
            let full = current.gas.saturating_add(gas) > budget || current.bytes + bytes > byte_budget;
            if full && !current.records.is_empty() {
                out.push(ImportChunk::new(std::mem::take(&mut current.records)));
                current.gas = 0;
                current.bytes = overhead;
            }
            current.gas = current.gas.saturating_add(gas);
            current.bytes += bytes;
            current.records.push(piece);
        }
        if !current.records.is_empty() {
            out.push(ImportChunk::new(current.records));
        }

        debug!(pieces = out.len(), "split chunk over budget");
        Ok(out)
    }

    /// Cut one record into pieces that each fit; only the first keeps the
    /// ledger. Entries trimmed from a piece roll into the next one.
    fn split_large_record(
        &self,
        record: LedgerToEntries,
        overhead: usize,
    ) -> Result<Vec<LedgerToEntries>> {
        let LedgerToEntries {
            ledger_key,
            mut ledger,
            entries,
        } = record;

        if entries.is_empty() {
            warn!(key = %ledger_key, "ledger record alone exceeds the transaction budget");
            return Ok(vec![LedgerToEntries::new(ledger_key, ledger, entries)]);
        }

        let available = self
            .config
            .gas_budget()
            .saturating_sub(self.costs.ledger_with_key_gas);
        let per_piece = match self.costs.entry_gas {
            0 => entries.len(),
            gas => usize::try_from(available / gas).unwrap_or(usize::MAX),
        }
        .max(1);

        let mut remaining: VecDeque<_> = entries.into();
        let mut pieces = Vec::new();
        while !remaining.is_empty() {
            let take = per_piece.min(remaining.len());
            let mut piece = LedgerToEntries::new(
                ledger_key.clone(),
                ledger.take(),
                remaining.drain(..take).collect(),
            );
            while piece.entries.len() > 1 && !self.record_fits(&piece, overhead)? {
                if let Some(entry) = piece.entries.pop() {
                    remaining.push_front(entry);
                }
            }
            if !self.record_fits(&piece, overhead)? {
                warn!(
                    key = %ledger_key,
                    correlation_id = piece.entries.first().map(|e| e.correlation_id.as_str()).unwrap_or(""),
                    "single entry exceeds the transaction budget"
                );
            }
            pieces.push(piece);
        }

        debug!(key = %ledger_key, pieces = pieces.len(), per_piece, "split oversized record");
        Ok(pieces)
    }
}
