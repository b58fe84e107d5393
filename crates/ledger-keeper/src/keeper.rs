//! The ledger keeper: owns the store handle, the registry oracle and the
//! event sink, and implements ledger class configuration.
//!
//! Ledger, entry, sequencing and balance operations live in sibling
//! modules as further `impl Keeper` blocks.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tracing::debug;

use ledger_types::{dates, LedgerClass, LedgerClassType, LedgerError, LedgerResult};

use crate::authz::RegistryOracle;
use crate::events::{EventSink, LedgerEvent, TracingEventSink};
use crate::keys::{self, ClassTypeKind};
use crate::store::{get_json, scan_json, set_json, EntryStore};

pub struct Keeper {
    pub(crate) store: Arc<dyn EntryStore>,
    pub(crate) registry: Arc<dyn RegistryOracle>,
    events: Arc<dyn EventSink>,
    authority: String,
    /// Current logical date in days since epoch.
    block_date: AtomicI32,
}

impl Keeper {
    pub fn new(
        store: Arc<dyn EntryStore>,
        registry: Arc<dyn RegistryOracle>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            events: Arc::new(TracingEventSink),
            authority: authority.into(),
            block_date: AtomicI32::new(dates::today()),
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_block_date(self, days: i32) -> Self {
        self.set_block_date(days);
        self
    }

    /// Address allowed to submit bulk imports.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn block_date(&self) -> i32 {
        self.block_date.load(Ordering::Relaxed)
    }

    pub fn set_block_date(&self, days: i32) {
        self.block_date.store(days, Ordering::Relaxed);
    }

    pub fn registry(&self) -> &dyn RegistryOracle {
        self.registry.as_ref()
    }

    pub(crate) fn emit(&self, event: LedgerEvent) {
        self.events.emit(event);
    }

    // ------------------------------------------------------------------
    // Ledger classes
    // ------------------------------------------------------------------

    pub fn add_ledger_class(&self, class: LedgerClass) -> LedgerResult<()> {
        class.validate()?;
        if !self.registry.asset_class_exists(&class.asset_class_id)? {
            return Err(LedgerError::invalid_field(
                "asset_class_id",
                "asset class doesn't exist",
            ));
        }
        let key = keys::ledger_class_key(&class.ledger_class_id);
        if self.store.has(&key)? {
            return Err(LedgerError::already_exists("ledger class"));
        }
        set_json(self.store.as_ref(), &key, &class)?;
        debug!(ledger_class = %class.ledger_class_id, "ledger class added");
        Ok(())
    }

    pub fn get_ledger_class(&self, ledger_class_id: &str) -> LedgerResult<Option<LedgerClass>> {
        get_json(self.store.as_ref(), &keys::ledger_class_key(ledger_class_id))
    }

    pub fn require_get_ledger_class(&self, ledger_class_id: &str) -> LedgerResult<LedgerClass> {
        self.get_ledger_class(ledger_class_id)?
            .ok_or_else(|| LedgerError::not_found("ledger class"))
    }

    pub fn get_all_ledger_classes(&self) -> LedgerResult<Vec<LedgerClass>> {
        Ok(scan_json(self.store.as_ref(), &keys::ledger_class_prefix())?
            .into_iter()
            .map(|(_, class)| class)
            .collect())
    }

    pub fn is_ledger_class_maintainer(&self, address: &str, ledger_class_id: &str) -> LedgerResult<bool> {
        Ok(self
            .get_ledger_class(ledger_class_id)?
            .is_some_and(|class| class.maintainer_address == address))
    }

    /// Register an entry, status or bucket type for a class.
    pub fn add_class_type(
        &self,
        kind: ClassTypeKind,
        ledger_class_id: &str,
        class_type: LedgerClassType,
    ) -> LedgerResult<()> {
        class_type.validate()?;
        self.require_get_ledger_class(ledger_class_id)?;
        let key = keys::class_type_key(kind, ledger_class_id, class_type.id);
        if self.store.has(&key)? {
            return Err(LedgerError::already_exists(kind.label()));
        }
        set_json(self.store.as_ref(), &key, &class_type)
    }

    /// Types of one class, ordered by id.
    pub fn get_class_types(&self, kind: ClassTypeKind, ledger_class_id: &str) -> LedgerResult<Vec<LedgerClassType>> {
        Ok(
            scan_json(self.store.as_ref(), &keys::class_type_prefix(kind, Some(ledger_class_id)))?
                .into_iter()
                .map(|(_, t)| t)
                .collect(),
        )
    }

    pub fn has_class_type(&self, kind: ClassTypeKind, ledger_class_id: &str, id: i32) -> LedgerResult<bool> {
        self.store.has(&keys::class_type_key(kind, ledger_class_id, id))
    }
}
