//! Per-asset financial ledgers with a resumable bulk import pipeline.
//!
//! - [`types`]: ledger, entry and import record types
//! - [`keeper`]: ledger state, entry sequencing, balances and authorization
//! - [`import`]: streaming chunker, gas model, optimizer, orchestrator and
//!   the local sandbox chain

pub use ledger_import as import;
pub use ledger_keeper as keeper;
pub use ledger_types as types;
