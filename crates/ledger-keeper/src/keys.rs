//! Store key layout.
//!
//! ```text
//! 0x01 | class_id                                   -> LedgerClass
//! 0x02 | class_id | 0x00 | id (i32 BE, sign-flipped) -> entry type
//! 0x03 | ...                                        -> status type
//! 0x04 | ...                                        -> bucket type
//! 0x05 | asset_class_id | 0x00 | nft_id                -> Ledger
//! 0x06 | asset_class_id | 0x00 | nft_id | 0x00 | corr  -> LedgerEntry
//! ```

use ledger_types::LedgerKey;

const LEDGER_CLASS_PREFIX: u8 = 0x01;
const ENTRY_TYPE_PREFIX: u8 = 0x02;
const STATUS_TYPE_PREFIX: u8 = 0x03;
const BUCKET_TYPE_PREFIX: u8 = 0x04;
const LEDGER_PREFIX: u8 = 0x05;
const ENTRY_PREFIX: u8 = 0x06;

/// The three per-class type tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassTypeKind {
    Entry,
    Status,
    Bucket,
}

impl ClassTypeKind {
    fn prefix(self) -> u8 {
        match self {
            ClassTypeKind::Entry => ENTRY_TYPE_PREFIX,
            ClassTypeKind::Status => STATUS_TYPE_PREFIX,
            ClassTypeKind::Bucket => BUCKET_TYPE_PREFIX,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClassTypeKind::Entry => "ledger class entry type",
            ClassTypeKind::Status => "ledger class status type",
            ClassTypeKind::Bucket => "ledger class bucket type",
        }
    }
}

fn with_prefix(prefix: u8, parts: &[&[u8]]) -> Vec<u8> {
    let len = 1 + parts.iter().map(|p| p.len() + 1).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.push(prefix);
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            key.push(0);
        }
        key.extend_from_slice(part);
    }
    key
}

pub fn ledger_class_key(class_id: &str) -> Vec<u8> {
    with_prefix(LEDGER_CLASS_PREFIX, &[class_id.as_bytes()])
}

pub fn ledger_class_prefix() -> Vec<u8> {
    vec![LEDGER_CLASS_PREFIX]
}

/// Ordered so that negative ids sort before positive ones.
fn encode_type_id(id: i32) -> [u8; 4] {
    ((id as u32) ^ 0x8000_0000).to_be_bytes()
}

pub fn class_type_key(kind: ClassTypeKind, class_id: &str, id: i32) -> Vec<u8> {
    with_prefix(kind.prefix(), &[class_id.as_bytes(), &encode_type_id(id)])
}

/// Prefix of every type of `kind`, or only those of one class.
pub fn class_type_prefix(kind: ClassTypeKind, class_id: Option<&str>) -> Vec<u8> {
    match class_id {
        Some(id) => {
            let mut key = with_prefix(kind.prefix(), &[id.as_bytes()]);
            key.push(0);
            key
        }
        None => vec![kind.prefix()],
    }
}

pub fn ledger_key(key: &LedgerKey) -> Vec<u8> {
    with_prefix(LEDGER_PREFIX, &[key.storage_string().as_bytes()])
}

pub fn ledger_prefix() -> Vec<u8> {
    vec![LEDGER_PREFIX]
}

pub fn entry_key(key: &LedgerKey, correlation_id: &str) -> Vec<u8> {
    with_prefix(
        ENTRY_PREFIX,
        &[key.storage_string().as_bytes(), correlation_id.as_bytes()],
    )
}

/// Prefix of every entry of one ledger. The trailing separator keeps
/// `nft-1` from matching `nft-10`.
pub fn entries_prefix(key: &LedgerKey) -> Vec<u8> {
    let mut prefix = with_prefix(ENTRY_PREFIX, &[key.storage_string().as_bytes()]);
    prefix.push(0);
    prefix
}

pub fn all_entries_prefix() -> Vec<u8> {
    vec![ENTRY_PREFIX]
}

/// Ledger class id of a class type store key.
pub fn decode_class_type_class_id(raw: &[u8]) -> Option<String> {
    let rest = raw.get(1..)?;
    let end = rest.iter().position(|b| *b == 0)?;
    String::from_utf8(rest[..end].to_vec()).ok()
}

/// Recover the ledger key from a ledger store key.
pub fn decode_ledger_key(raw: &[u8]) -> Option<LedgerKey> {
    let rest = raw.strip_prefix(&[LEDGER_PREFIX])?;
    LedgerKey::from_storage_string(std::str::from_utf8(rest).ok()?)
}

/// Recover the ledger key from an entry store key.
pub fn decode_entry_ledger_key(raw: &[u8]) -> Option<LedgerKey> {
    let rest = std::str::from_utf8(raw.strip_prefix(&[ENTRY_PREFIX])?).ok()?;
    let mut parts = rest.splitn(3, '\0');
    let asset_class_id = parts.next()?;
    let nft_id = parts.next()?;
    parts.next()?;
    Some(LedgerKey::new(asset_class_id, nft_id))
}
