//! `balances`: as-of bucket balances of one ledger.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use ledger_import::LocalChain;
use ledger_types::{dates, LedgerKey};

use super::output;

#[derive(Parser, Debug)]
pub struct BalancesCmd {
    /// Local chain state file
    #[arg(long, default_value = "chain-state.json")]
    pub chain_state: PathBuf,

    #[arg(long)]
    pub asset_class_id: String,

    #[arg(long)]
    pub nft_id: String,

    /// YYYY-MM-DD or days since epoch (default: the chain's block date)
    #[arg(long)]
    pub as_of: Option<String>,

    /// Also list the ledger's entries
    #[arg(long)]
    pub entries: bool,
}

impl BalancesCmd {
    pub fn execute(&self, json_output: bool) -> Result<()> {
        let chain = LocalChain::open(&self.chain_state)?;
        let keeper = chain.keeper();
        let key = LedgerKey::new(self.asset_class_id.clone(), self.nft_id.clone());

        let as_of = match &self.as_of {
            Some(input) => dates::parse_day(input).map_err(|e| anyhow!("Invalid --as-of: {}", e))?,
            None => keeper.block_date(),
        };
        let balances = keeper
            .balances_as_of(&key, as_of)
            .map_err(|e| anyhow!("Failed to compute balances for {}: {}", key, e))?;
        let entries = if self.entries {
            Some(
                keeper
                    .list_ledger_entries(&key)
                    .map_err(|e| anyhow!("Failed to list entries for {}: {}", key, e))?,
            )
        } else {
            None
        };

        output::print_balances(&key, as_of, &balances, entries.as_deref(), json_output)
    }
}
