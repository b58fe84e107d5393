//! Ordered key-value persistence.
//!
//! The keeper only needs get/set/has/delete and prefix iteration over byte
//! keys; [`MemStore`] provides that over a `BTreeMap`.

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

use ledger_types::{LedgerError, LedgerResult};

/// Ordered byte-keyed store.
pub trait EntryStore: Send + Sync {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>>;

    fn set(&self, key: &[u8], value: Vec<u8>) -> LedgerResult<()>;

    fn has(&self, key: &[u8]) -> LedgerResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn delete(&self, key: &[u8]) -> LedgerResult<()>;

    /// All pairs whose key starts with `prefix`, in key order.
    fn iterate_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// Read and decode a JSON value.
pub fn get_json<T: DeserializeOwned>(store: &dyn EntryStore, key: &[u8]) -> LedgerResult<Option<T>> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| LedgerError::internal(format!("corrupt record: {}", e))),
        None => Ok(None),
    }
}

pub fn set_json<T: Serialize>(store: &dyn EntryStore, key: &[u8], value: &T) -> LedgerResult<()> {
    store.set(key, serde_json::to_vec(value)?)
}

/// Decode every value under a prefix.
pub fn scan_json<T: DeserializeOwned>(store: &dyn EntryStore, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, T)>> {
    store
        .iterate_prefix(prefix)?
        .into_iter()
        .map(|(k, v)| {
            serde_json::from_slice(&v)
                .map(|decoded| (k, decoded))
                .map_err(|e| LedgerError::internal(format!("corrupt record: {}", e)))
        })
        .collect()
}

/// In-memory ordered store.
#[derive(Default)]
pub struct MemStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Independent copy of the current contents.
    pub fn snapshot(&self) -> MemStore {
        MemStore {
            data: RwLock::new(self.data.read().clone()),
        }
    }

    /// Replace the contents with those of `other`.
    pub fn restore_from(&self, other: &MemStore) {
        let copy = other.data.read().clone();
        *self.data.write() = copy;
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl EntryStore for MemStore {
    fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn set(&self, key: &[u8], value: Vec<u8>) -> LedgerResult<()> {
        self.data.write().insert(key.to_vec(), value);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> LedgerResult<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn delete(&self, key: &[u8]) -> LedgerResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
