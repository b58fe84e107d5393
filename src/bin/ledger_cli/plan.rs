//! `plan`: chunk and price a file without importing it.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use ledger_import::ImportOrchestrator;

use super::{output, status_store, ChainArgs, LimitArgs};

#[derive(Parser, Debug)]
pub struct PlanCmd {
    /// JSON file with a `ledgerToEntries` array
    pub file: PathBuf,

    /// Chunk size bound in bytes before gas optimization (default: 5000000)
    pub max_chunk_size_bytes: Option<usize>,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub limits: LimitArgs,
}

impl PlanCmd {
    pub async fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        if !self.file.exists() {
            return Err(anyhow!("import file {} not found", self.file.display()));
        }
        let (chain, signer) = self.chain.open()?;
        let orchestrator = ImportOrchestrator::for_chain(
            self.limits.config(self.max_chunk_size_bytes),
            status_store(None),
            chain,
            signer,
        );
        let plan = orchestrator.plan(&self.file).await?;
        output::print_plan(&plan, json_output, verbose)
    }
}
