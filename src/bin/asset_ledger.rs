//! asset-ledger: bulk import and queries against a local ledger chain
//!
//! ## Example Usage
//!
//! ```bash
//! # Import a file in chunks of at most 2 MB, without prompting
//! asset-ledger chunked-bulk-import ledgers.json 2000000 --chain-state chain.json --yes
//!
//! # Resume an interrupted import
//! asset-ledger chunked-bulk-import ledgers.json --import-id import_1718000000 --yes
//!
//! # Inspect progress
//! asset-ledger bulk-import-status import_1718000000
//!
//! # Dry run: how the file would be chunked and what it would cost
//! asset-ledger plan ledgers.json --chain-state chain.json
//!
//! # Bucket balances of one ledger as of a date
//! asset-ledger balances --asset-class-id asset-1 --nft-id nft-7 --as-of 2024-06-30
//! ```

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod ledger_cli;

use ledger_cli::{
    balances::BalancesCmd, import::ImportCmd, output, plan::PlanCmd, status::StatusCmd,
};

#[derive(Parser)]
#[command(
    name = "asset-ledger",
    author,
    version,
    about = "Per-asset ledgers with resumable bulk import",
    long_about = "Imports ledger data into a local ledger chain in gas-bounded chunks,\n\
                  tracks progress in a status file and answers balance queries."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a ledger file in chunks, resumably
    ChunkedBulkImport(ImportCmd),

    /// Show the progress of a chunked import
    BulkImportStatus(StatusCmd),

    /// Show how a file would be chunked without importing it
    Plan(PlanCmd),

    /// Query bucket balances of a ledger as of a date
    Balances(BalancesCmd),
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() {
    let Cli {
        command,
        json,
        verbose,
    } = Cli::parse();
    init_tracing(verbose);

    let result = match command {
        Commands::ChunkedBulkImport(cmd) => cmd.execute(json, verbose).await,
        Commands::BulkImportStatus(cmd) => cmd.execute(json),
        Commands::Plan(cmd) => cmd.execute(json, verbose).await,
        Commands::Balances(cmd) => cmd.execute(json),
    };

    if let Err(err) = result {
        eprint!("{}", output::format_error(&err, json));
        if json {
            eprintln!();
        }
        std::process::exit(1);
    }
}
