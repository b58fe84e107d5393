//! Whole-state export and import.

use serde::{Deserialize, Serialize};
use tracing::info;

use ledger_types::{Ledger, LedgerClass, LedgerClassType, LedgerEntry, LedgerError, LedgerKey, LedgerResult};

use crate::keeper::Keeper;
use crate::keys::{self, ClassTypeKind};
use crate::store::{scan_json, set_json};

/// A class type together with the class it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedClassType {
    #[serde(alias = "ledger_class_id")]
    pub ledger_class_id: String,
    #[serde(flatten)]
    pub class_type: LedgerClassType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisLedgerEntry {
    pub key: LedgerKey,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerGenesis {
    #[serde(alias = "ledger_classes")]
    pub ledger_classes: Vec<LedgerClass>,
    #[serde(alias = "ledger_class_entry_types")]
    pub ledger_class_entry_types: Vec<ScopedClassType>,
    #[serde(alias = "ledger_class_status_types")]
    pub ledger_class_status_types: Vec<ScopedClassType>,
    #[serde(alias = "ledger_class_bucket_types")]
    pub ledger_class_bucket_types: Vec<ScopedClassType>,
    pub ledgers: Vec<Ledger>,
    #[serde(alias = "ledger_entries")]
    pub ledger_entries: Vec<GenesisLedgerEntry>,
}

impl LedgerGenesis {
    fn types_mut(&mut self, kind: ClassTypeKind) -> &mut Vec<ScopedClassType> {
        match kind {
            ClassTypeKind::Entry => &mut self.ledger_class_entry_types,
            ClassTypeKind::Status => &mut self.ledger_class_status_types,
            ClassTypeKind::Bucket => &mut self.ledger_class_bucket_types,
        }
    }

    fn types(&self, kind: ClassTypeKind) -> &[ScopedClassType] {
        match kind {
            ClassTypeKind::Entry => &self.ledger_class_entry_types,
            ClassTypeKind::Status => &self.ledger_class_status_types,
            ClassTypeKind::Bucket => &self.ledger_class_bucket_types,
        }
    }
}

const KINDS: [ClassTypeKind; 3] = [ClassTypeKind::Entry, ClassTypeKind::Status, ClassTypeKind::Bucket];

impl Keeper {
    pub fn export_genesis(&self) -> LedgerResult<LedgerGenesis> {
        let store = self.store.as_ref();
        let mut genesis = LedgerGenesis {
            ledger_classes: self.get_all_ledger_classes()?,
            ledgers: self.get_all_ledgers()?,
            ..Default::default()
        };

        for kind in KINDS {
            for (raw, class_type) in scan_json::<LedgerClassType>(store, &keys::class_type_prefix(kind, None))? {
                let ledger_class_id = keys::decode_class_type_class_id(&raw)
                    .ok_or_else(|| LedgerError::internal("invalid class type store key"))?;
                genesis.types_mut(kind).push(ScopedClassType {
                    ledger_class_id,
                    class_type,
                });
            }
        }

        for (raw, entry) in scan_json::<LedgerEntry>(store, &keys::all_entries_prefix())? {
            let key = keys::decode_entry_ledger_key(&raw)
                .ok_or_else(|| LedgerError::internal("invalid ledger entry store key"))?;
            genesis.ledger_entries.push(GenesisLedgerEntry { key, entry });
        }
        Ok(genesis)
    }

    /// Write a genesis state into the store as-is. Records are checked for
    /// shape only; cross-record rules are assumed to hold in the export.
    pub fn init_genesis(&self, genesis: &LedgerGenesis) -> LedgerResult<()> {
        let store = self.store.as_ref();
        for (i, class) in genesis.ledger_classes.iter().enumerate() {
            class
                .validate()
                .map_err(|e| e.within(&format!("ledger_classes[{}]", i)))?;
            set_json(store, &keys::ledger_class_key(&class.ledger_class_id), class)?;
        }

        for kind in KINDS {
            for scoped in genesis.types(kind) {
                set_json(
                    store,
                    &keys::class_type_key(kind, &scoped.ledger_class_id, scoped.class_type.id),
                    &scoped.class_type,
                )?;
            }
        }

        for (i, ledger) in genesis.ledgers.iter().enumerate() {
            let key = ledger
                .key
                .clone()
                .ok_or_else(|| LedgerError::missing_field(format!("ledgers[{}].key", i)))?;
            self.put_ledger(&key, ledger.clone())?;
        }

        for record in &genesis.ledger_entries {
            self.put_entry(&record.key, &record.entry)?;
        }

        info!(
            classes = genesis.ledger_classes.len(),
            ledgers = genesis.ledgers.len(),
            entries = genesis.ledger_entries.len(),
            "genesis loaded"
        );
        Ok(())
    }
}
