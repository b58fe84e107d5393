//! Authorization of ledger mutations.
//!
//! A ledger may be mutated by the owner of its NFT unless the asset's
//! registry delegates it to a SERVICER, in which case only the listed
//! servicer addresses may act.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use ledger_types::{LedgerError, LedgerKey, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RegistryRole {
    Originator,
    Servicer,
    Subservicer,
    Controller,
    Custodian,
    Borrower,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    pub role: RegistryRole,
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: LedgerKey,
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
}

impl RegistryEntry {
    pub fn new(key: LedgerKey) -> Self {
        Self {
            key,
            roles: Vec::new(),
        }
    }

    pub fn with_role(mut self, role: RegistryRole, addresses: &[&str]) -> Self {
        self.roles.push(RoleEntry {
            role,
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        });
        self
    }

    pub fn addresses_for(&self, role: RegistryRole) -> Option<&[String]> {
        self.roles
            .iter()
            .find(|r| r.role == role)
            .map(|r| r.addresses.as_slice())
    }
}

/// Registry and NFT ownership lookups.
pub trait RegistryOracle: Send + Sync {
    fn get_registry(&self, key: &LedgerKey) -> LedgerResult<Option<RegistryEntry>>;

    fn get_nft_owner(&self, key: &LedgerKey) -> LedgerResult<Option<String>>;

    fn has_nft(&self, key: &LedgerKey) -> LedgerResult<bool> {
        Ok(self.get_nft_owner(key)?.is_some())
    }

    fn asset_class_exists(&self, asset_class_id: &str) -> LedgerResult<bool>;
}

/// Who may mutate a ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delegation {
    OwnerOnly,
    ServicerOnly(Vec<String>),
}

/// A SERVICER role with no addresses does not delegate.
pub fn resolve_delegation(entry: Option<&RegistryEntry>) -> Delegation {
    match entry.and_then(|e| e.addresses_for(RegistryRole::Servicer)) {
        Some(addresses) if !addresses.is_empty() => Delegation::ServicerOnly(addresses.to_vec()),
        _ => Delegation::OwnerOnly,
    }
}

pub fn authorize(registry: &dyn RegistryOracle, signer: &str, key: &LedgerKey) -> LedgerResult<()> {
    let entry = registry.get_registry(key)?;
    match resolve_delegation(entry.as_ref()) {
        Delegation::ServicerOnly(servicers) => {
            if servicers.iter().any(|s| s == signer) {
                Ok(())
            } else {
                Err(LedgerError::unauthorized(format!(
                    "{} is not a registered servicer of {}",
                    signer, key
                )))
            }
        }
        Delegation::OwnerOnly => match registry.get_nft_owner(key)? {
            Some(owner) if owner == signer => Ok(()),
            Some(_) => Err(LedgerError::unauthorized(format!(
                "{} is not the owner of {}",
                signer, key
            ))),
            None => Err(LedgerError::unauthorized(format!("{} has no owner", key))),
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRecord {
    pub key: LedgerKey,
    pub owner: String,
}

/// Serializable contents of a [`MemRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryState {
    pub asset_classes: Vec<String>,
    pub nfts: Vec<NftRecord>,
    pub entries: Vec<RegistryEntry>,
}

#[derive(Default)]
struct RegistryData {
    asset_classes: BTreeSet<String>,
    owners: BTreeMap<LedgerKey, String>,
    entries: BTreeMap<LedgerKey, RegistryEntry>,
}

/// In-memory registry and NFT ownership table.
#[derive(Default)]
pub struct MemRegistry {
    data: RwLock<RegistryData>,
}

impl MemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RegistryState) -> Self {
        let registry = Self::new();
        for class in state.asset_classes {
            registry.add_asset_class(class);
        }
        for nft in state.nfts {
            registry.set_nft_owner(nft.key, nft.owner);
        }
        for entry in state.entries {
            registry.set_registry(entry);
        }
        registry
    }

    pub fn to_state(&self) -> RegistryState {
        let data = self.data.read();
        RegistryState {
            asset_classes: data.asset_classes.iter().cloned().collect(),
            nfts: data
                .owners
                .iter()
                .map(|(key, owner)| NftRecord {
                    key: key.clone(),
                    owner: owner.clone(),
                })
                .collect(),
            entries: data.entries.values().cloned().collect(),
        }
    }

    pub fn add_asset_class(&self, asset_class_id: impl Into<String>) {
        self.data.write().asset_classes.insert(asset_class_id.into());
    }

    /// Mint (or transfer) an NFT; its asset class is registered too.
    pub fn set_nft_owner(&self, key: LedgerKey, owner: impl Into<String>) {
        let mut data = self.data.write();
        data.asset_classes.insert(key.asset_class_id.clone());
        data.owners.insert(key, owner.into());
    }

    pub fn set_registry(&self, entry: RegistryEntry) {
        self.data.write().entries.insert(entry.key.clone(), entry);
    }

    pub fn remove_registry(&self, key: &LedgerKey) {
        self.data.write().entries.remove(key);
    }
}

impl RegistryOracle for MemRegistry {
    fn get_registry(&self, key: &LedgerKey) -> LedgerResult<Option<RegistryEntry>> {
        Ok(self.data.read().entries.get(key).cloned())
    }

    fn get_nft_owner(&self, key: &LedgerKey) -> LedgerResult<Option<String>> {
        Ok(self.data.read().owners.get(key).cloned())
    }

    fn asset_class_exists(&self, asset_class_id: &str) -> LedgerResult<bool> {
        Ok(self.data.read().asset_classes.contains(asset_class_id))
    }
}
