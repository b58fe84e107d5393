//! Linear gas model and its estimation by simulation.
//!
//! A record costs `ledger_with_key_gas` when it creates a ledger plus
//! `entry_gas` per entry. The two coefficients are measured by simulating
//! one representative record with zero, one and up to ten entries.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use ledger_types::{ImportChunk, LedgerToEntries, MsgBulkImport};

use crate::oracle::Simulator;

/// Chunks scanned for a sample record.
pub const MAX_ESTIMATION_CHUNKS: usize = 3;

/// Entries used for the marginal-cost simulation.
pub const MAX_SAMPLE_ENTRIES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasCosts {
    pub ledger_with_key_gas: u64,
    pub entry_gas: u64,
}

impl GasCosts {
    /// Used when no sample exists or estimation fails.
    pub const FALLBACK: GasCosts = GasCosts {
        ledger_with_key_gas: 100_000,
        entry_gas: 5_000,
    };

    pub fn record_gas(&self, record: &LedgerToEntries) -> u64 {
        let entries = (record.entries.len() as u64).saturating_mul(self.entry_gas);
        if record.has_ledger() {
            entries.saturating_add(self.ledger_with_key_gas)
        } else {
            entries
        }
    }

    pub fn chunk_gas(&self, chunk: &ImportChunk) -> u64 {
        chunk
            .ledger_to_entries
            .iter()
            .fold(0u64, |acc, r| acc.saturating_add(self.record_gas(r)))
    }
}

impl Default for GasCosts {
    fn default() -> Self {
        Self::FALLBACK
    }
}

pub struct GasCostEstimator {
    simulator: Arc<dyn Simulator>,
    authority: String,
}

impl GasCostEstimator {
    pub fn new(simulator: Arc<dyn Simulator>, authority: impl Into<String>) -> Self {
        Self {
            simulator,
            authority: authority.into(),
        }
    }

    fn find_sample(chunks: &[ImportChunk]) -> Option<&LedgerToEntries> {
        chunks
            .iter()
            .take(MAX_ESTIMATION_CHUNKS)
            .flat_map(|c| c.ledger_to_entries.iter())
            .find(|r| r.has_ledger() && !r.entries.is_empty())
    }

    async fn simulate_with(&self, sample: &LedgerToEntries, entries: usize) -> Result<u64> {
        let record = LedgerToEntries::new(
            sample.ledger_key.clone(),
            sample.ledger.clone(),
            sample.entries[..entries].to_vec(),
        );
        let msg = MsgBulkImport::new(self.authority.clone(), ImportChunk::new(vec![record]));
        self.simulator.simulate(&msg).await
    }

    pub async fn estimate(&self, chunks: &[ImportChunk]) -> Result<GasCosts> {
        let Some(sample) = Self::find_sample(chunks) else {
            info!("no record with a ledger and entries to sample, using fallback gas costs");
            return Ok(GasCosts::FALLBACK);
        };

        let base = self
            .simulate_with(sample, 0)
            .await
            .map_err(|e| anyhow!("failed to simulate ledger without entries: {}", e))?;
        let one = self
            .simulate_with(sample, 1)
            .await
            .map_err(|e| anyhow!("failed to simulate ledger with one entry: {}", e))?;

        let n = sample.entries.len().min(MAX_SAMPLE_ENTRIES);
        let marginal = if n > 1 {
            match self.simulate_with(sample, n).await {
                Ok(many) => many.saturating_sub(base) / n as u64,
                Err(e) => {
                    debug!(error = %e, entries = n, "multi-entry simulation failed, using single-entry delta");
                    one.saturating_sub(base)
                }
            }
        } else {
            one.saturating_sub(base)
        };

        let costs = GasCosts {
            ledger_with_key_gas: base,
            entry_gas: marginal,
        };
        info!(
            ledger_with_key_gas = costs.ledger_with_key_gas,
            entry_gas = costs.entry_gas,
            sample = %sample.ledger_key,
            "estimated gas costs"
        );
        Ok(costs)
    }
}
