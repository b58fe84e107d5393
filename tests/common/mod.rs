#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! - `fixtures`: chain state and import file builders

pub mod fixtures;

pub use fixtures::{
    entry_ids, record_entry_ids, record_json, setup_chain, write_chain_state, write_import_file,
    write_import_records, AUTHORITY, BLOCK_DATE, OWNER,
};
