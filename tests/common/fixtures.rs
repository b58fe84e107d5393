//! Chain state and import file builders.
//!
//! Every chain built here has ledger class `class-1` on asset class
//! `asset-1` with entry types 1..=2, bucket types 1..=2 and status type 1,
//! and NFTs `nft-0`.. owned by [`OWNER`].

use anyhow::Result;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use asset_ledger::import::LocalChain;
use asset_ledger::keeper::ClassTypeKind;
use asset_ledger::types::{LedgerClass, LedgerClassType, LedgerKey};

pub const AUTHORITY: &str = "gov-authority";
pub const OWNER: &str = "owner-addr";
/// 2024-10-04
pub const BLOCK_DATE: i32 = 20_000;

pub fn setup_chain(nfts: usize) -> Result<LocalChain> {
    let chain = LocalChain::new(AUTHORITY, BLOCK_DATE);
    let registry = chain.registry();
    registry.add_asset_class("asset-1");
    for i in 0..nfts {
        registry.set_nft_owner(LedgerKey::new("asset-1", format!("nft-{}", i)), OWNER);
    }

    let keeper = chain.keeper();
    keeper.add_ledger_class(LedgerClass {
        ledger_class_id: "class-1".into(),
        asset_class_id: "asset-1".into(),
        denom: "nhash".into(),
        maintainer_address: "maintainer".into(),
    })?;
    for (kind, types) in [
        (ClassTypeKind::Entry, [(1, "DISB", "Disbursement"), (2, "PAY", "Payment")]),
        (ClassTypeKind::Bucket, [(1, "PRINCIPAL", "Principal"), (2, "INTEREST", "Interest")]),
    ] {
        for (id, code, description) in types {
            keeper.add_class_type(kind, "class-1", LedgerClassType::new(id, code, description))?;
        }
    }
    keeper.add_class_type(
        ClassTypeKind::Status,
        "class-1",
        LedgerClassType::new(1, "CURRENT", "Current"),
    )?;
    Ok(chain)
}

pub fn write_chain_state(dir: &Path, nfts: usize) -> Result<PathBuf> {
    let path = dir.join("chain-state.json");
    setup_chain(nfts)?.save_to(&path)?;
    Ok(path)
}

/// One ledger with `entries` entries. Entry `j` is effective on day
/// `19_000 + j` and leaves principal at `1000 - 100 * (j + 1)`.
pub fn record_json(i: usize, entries: usize) -> Value {
    let entries: Vec<_> = (0..entries)
        .map(|j| {
            json!({
                "correlationId": format!("l{}-e{}", i, j),
                "sequence": 0,
                "entryTypeId": 2,
                "postedDate": 19_000 + j,
                "effectiveDate": 19_000 + j,
                "totalAmt": "100",
                "appliedAmounts": [{"bucketTypeId": 1, "appliedAmt": "-100"}],
                "balanceAmounts": [{"bucketTypeId": 1, "balanceAmt": (1000 - 100 * (j as i64 + 1)).to_string()}]
            })
        })
        .collect();
    json!({
        "ledgerKey": {"assetClassId": "asset-1", "nftId": format!("nft-{}", i)},
        "ledger": {"ledgerClassId": "class-1", "statusTypeId": 1, "interestRate": 5_000_000},
        "entries": entries
    })
}

pub fn write_import_file(dir: &Path, ledgers: usize, entries: usize) -> Result<PathBuf> {
    write_import_records(dir, &vec![entries; ledgers])
}

/// Record `i` gets `entries[i]` entries; a record with none only creates
/// its ledger.
pub fn write_import_records(dir: &Path, entries: &[usize]) -> Result<PathBuf> {
    let records: Vec<_> = entries.iter().enumerate().map(|(i, &n)| record_json(i, n)).collect();
    let path = dir.join("import.json");
    std::fs::write(
        &path,
        serde_json::to_vec_pretty(&json!({ "ledgerToEntries": records }))?,
    )?;
    Ok(path)
}

/// Correlation ids of a file written by [`write_import_file`], in order.
pub fn entry_ids(ledgers: usize, entries: usize) -> Vec<String> {
    record_entry_ids(&vec![entries; ledgers])
}

/// Correlation ids of a file written by [`write_import_records`], in order.
pub fn record_entry_ids(entries: &[usize]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .flat_map(|(i, &n)| (0..n).map(move |j| format!("l{}-e{}", i, j)))
        .collect()
}
