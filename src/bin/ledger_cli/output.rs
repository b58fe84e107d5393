//! Output formatting for the asset-ledger CLI
//!
//! Human-readable and JSON renderings of import status, plans and balances.

use anyhow::Result;
use chrono::SecondsFormat;
use serde::Serialize;

use ledger_import::{BulkImportStatus, ImportPlan, ImportReport, ImportSession, ImportState, StatusStore};
use ledger_types::{dates, BucketBalance, LedgerEntry, LedgerKey};

fn state_label(state: ImportState) -> String {
    match state {
        ImportState::Completed => format!("\x1b[32m{}\x1b[0m", state),
        ImportState::Failed => format!("\x1b[31m{}\x1b[0m", state),
        ImportState::InProgress => format!("\x1b[33m{}\x1b[0m", state),
        ImportState::Pending => state.to_string(),
    }
}

fn format_day(days: i32) -> String {
    dates::date_from_days(days)
        .map(|d| d.to_string())
        .unwrap_or_else(|| days.to_string())
}

pub fn format_status(status: &BulkImportStatus) -> String {
    let mut out = format!(
        "\x1b[1mImport {}\x1b[0m: {}\n",
        status.import_id,
        state_label(status.status)
    );
    out.push_str(&format!(
        "  Chunks:   {}/{}\n",
        status.completed_chunks, status.total_chunks
    ));
    out.push_str(&format!("  Ledgers:  {}\n", status.total_ledgers));
    out.push_str(&format!("  Entries:  {}\n", status.total_entries));
    if let Some(id) = &status.last_successful_correlation_id {
        out.push_str(&format!("  Last committed correlation id: {}\n", id));
    }
    if let Some(cursor) = &status.resume_cursor {
        out.push_str(&format!("  Resume point: {}\n", cursor));
    }
    if let Some(attempt) = status.last_attempted_chunk.as_ref().filter(|a| !a.confirmed) {
        out.push_str(&format!(
            "  Unconfirmed chunk {}: tx {}\n",
            attempt.chunk_index, attempt.transaction_hash
        ));
    }
    if let Some(costs) = &status.gas_costs {
        out.push_str(&format!(
            "  Gas model: {} per ledger, {} per entry\n",
            costs.ledger_with_key_gas, costs.entry_gas
        ));
    }
    out.push_str(&format!(
        "  Started:  {}\n  Updated:  {}\n",
        status.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        status.updated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    if let Some(message) = &status.error_message {
        out.push_str(&format!("  \x1b[31mError:\x1b[0m {}\n", message));
    }
    out
}

pub fn print_status(status: &BulkImportStatus, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(status)?);
    } else {
        print!("{}", format_status(status));
    }
    Ok(())
}

/// Summary shown before asking to proceed.
pub fn print_session(session: &ImportSession, store: &StatusStore) {
    println!("Import id:   {}", session.import_id());
    println!("File:        {}", session.file.display());
    println!("Status file: {}", store.path_for(session.import_id()).display());
    println!(
        "Chunks:      {} to submit ({} already committed)",
        session.remaining_chunks(),
        session.status.completed_chunks
    );
    let cursor = session.resume_cursor();
    if !cursor.is_start() {
        match session.resume_from() {
            Some(id) => println!("Resuming at {} (after correlation id {})", cursor, id),
            None => println!("Resuming at {}", cursor),
        }
    }
    println!(
        "Gas model:   {} per ledger, {} per entry",
        session.costs.ledger_with_key_gas, session.costs.entry_gas
    );
}

pub fn print_report(report: &ImportReport, json_output: bool, verbose: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "\x1b[32m✓ Import {} completed\x1b[0m: {} chunks submitted this run",
        report.import_id, report.chunks_submitted
    );
    if verbose {
        print!("{}", format_status(&report.status));
    }
    Ok(())
}

pub fn print_plan(plan: &ImportPlan, json_output: bool, verbose: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(plan)?);
        return Ok(());
    }

    println!(
        "\x1b[1mPlan:\x1b[0m {} chunks, {} records, {} entries",
        plan.chunks.len(),
        plan.total_ledgers,
        plan.total_entries
    );
    println!(
        "Gas model: {} per ledger, {} per entry (budget {} per tx, max {} bytes)",
        plan.gas_costs.ledger_with_key_gas,
        plan.gas_costs.entry_gas,
        plan.gas_budget,
        plan.max_tx_size_bytes
    );

    let over: Vec<_> = plan.chunks.iter().filter(|c| !c.within_limits).collect();
    if verbose || !over.is_empty() {
        println!();
        for chunk in &plan.chunks {
            if !verbose && chunk.within_limits {
                continue;
            }
            let marker = if chunk.within_limits { " " } else { "\x1b[31m!\x1b[0m" };
            println!(
                "{} [{:>4}] {:>5} records {:>7} entries {:>9} bytes {:>10} gas  {}..{}",
                marker,
                chunk.index,
                chunk.records,
                chunk.entries,
                chunk.size_bytes,
                chunk.estimated_gas,
                chunk.first_correlation_id.as_deref().unwrap_or("-"),
                chunk.last_correlation_id.as_deref().unwrap_or("-")
            );
        }
    }
    if !over.is_empty() {
        println!("\n\x1b[31m{} chunks exceed transaction limits\x1b[0m", over.len());
    }
    Ok(())
}

pub fn print_balances(
    key: &LedgerKey,
    as_of: i32,
    balances: &[BucketBalance],
    entries: Option<&[LedgerEntry]>,
    json_output: bool,
) -> Result<()> {
    if json_output {
        #[derive(Serialize)]
        struct BalancesJson<'a> {
            ledger_key: &'a LedgerKey,
            as_of: String,
            balances: &'a [BucketBalance],
            #[serde(skip_serializing_if = "Option::is_none")]
            entries: Option<&'a [LedgerEntry]>,
        }

        let json = BalancesJson {
            ledger_key: key,
            as_of: format_day(as_of),
            balances,
            entries,
        };
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("\x1b[1mBalances of {} as of {}\x1b[0m", key, format_day(as_of));
    if balances.is_empty() {
        println!("  (no balances)");
    }
    for balance in balances {
        println!("  bucket {:>3}: {}", balance.bucket_type_id, balance.balance_amt);
    }

    if let Some(entries) = entries {
        println!("\n\x1b[1mEntries:\x1b[0m");
        for entry in entries {
            println!(
                "  {} seq {:>3} type {:>3} effective {} total {}{}",
                entry.correlation_id,
                entry.sequence,
                entry.entry_type_id,
                format_day(entry.effective_date),
                entry.total_amt,
                if entry.is_void { " (void)" } else { "" }
            );
        }
    }
    Ok(())
}

/// Format an error for display
pub fn format_error(error: &anyhow::Error, json_output: bool) -> String {
    if json_output {
        #[derive(Serialize)]
        struct ErrorJson {
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            cause: Option<String>,
        }

        let err = ErrorJson {
            error: error.to_string(),
            cause: error.chain().nth(1).map(|e| e.to_string()),
        };
        serde_json::to_string_pretty(&err).unwrap_or_else(|_| "{}".to_string())
    } else {
        let mut out = format!("\x1b[31mError:\x1b[0m {}\n", error);
        let mut causes = error.chain().skip(1).peekable();
        if causes.peek().is_some() {
            out.push_str("Caused by:\n");
            for (idx, cause) in causes.enumerate() {
                out.push_str(&format!("  {}: {}\n", idx + 1, cause));
            }
        }
        out
    }
}
