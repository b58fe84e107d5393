//! `chunked-bulk-import`: stream a file into the local chain.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use ledger_import::{CommitWaitConfig, ImportOrchestrator, SessionPlan};
use ledger_types::env_utils::env_bool;

use super::{output, status_store, ChainArgs, LimitArgs};

#[derive(Parser, Debug)]
pub struct ImportCmd {
    /// JSON file with a `ledgerToEntries` array
    pub file: PathBuf,

    /// Chunk size bound in bytes before gas optimization (default: 5000000)
    pub max_chunk_size_bytes: Option<usize>,

    /// Name of the import; pass an existing one to resume it
    #[arg(long)]
    pub import_id: Option<String>,

    /// Do not ask for confirmation
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Directory for status files
    #[arg(long)]
    pub status_dir: Option<PathBuf>,

    #[command(flatten)]
    pub chain: ChainArgs,

    #[command(flatten)]
    pub limits: LimitArgs,
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{} [y/N] ", prompt);
    std::io::stderr().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|e| anyhow!("Failed to read confirmation: {}", e))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

impl ImportCmd {
    pub async fn execute(&self, json_output: bool, verbose: bool) -> Result<()> {
        if !self.file.exists() {
            return Err(anyhow!("import file {} not found", self.file.display()));
        }
        let (chain, signer) = self.chain.open()?;
        let config = self.limits.config(self.max_chunk_size_bytes);
        // The local chain commits synchronously, so only wait when asked to.
        let wait = CommitWaitConfig::from_env_with(CommitWaitConfig::immediate());
        let orchestrator =
            ImportOrchestrator::for_chain(config, status_store(self.status_dir.as_ref()), chain, signer)
                .with_commit_wait(wait);

        let session = match orchestrator.prepare(&self.file, self.import_id.as_deref()).await? {
            SessionPlan::AlreadyCompleted(status) => {
                if json_output {
                    println!("{}", serde_json::to_string_pretty(&status)?);
                } else {
                    println!("Import {} already completed", status.import_id);
                }
                return Ok(());
            }
            SessionPlan::Ready(session) => session,
        };

        if !json_output {
            output::print_session(&session, orchestrator.status_store());
        }

        if !(self.yes || env_bool("LEDGER_IMPORT_ASSUME_YES")) && !confirm("Proceed with import?")? {
            println!(
                "Import cancelled; resume with --import-id {}",
                session.import_id()
            );
            return Ok(());
        }

        let report = orchestrator.run(session).await?;
        output::print_report(&report, json_output, verbose)
    }
}
