//! Ledger state keeper.
//!
//! [`Keeper`] stores ledger classes, ledgers and entries in an
//! [`EntryStore`], sequences appended entries, computes as-of balances and
//! applies bulk import chunks. Mutations arriving as signed messages go
//! through [`MsgServer`], which consults a [`RegistryOracle`] to decide who
//! may touch a ledger.

pub mod authz;
pub mod balances;
pub mod entries;
pub mod events;
pub mod genesis;
pub mod keeper;
pub mod keys;
pub mod ledgers;
pub mod msgs;
pub mod sequencing;
pub mod store;

pub use authz::{
    authorize, resolve_delegation, Delegation, MemRegistry, RegistryEntry, RegistryOracle,
    RegistryRole, RegistryState,
};
pub use balances::compute_balances_as_of;
pub use events::{EventSink, LedgerEvent, RecordingEventSink, TracingEventSink, UpdateType};
pub use genesis::LedgerGenesis;
pub use keeper::Keeper;
pub use keys::ClassTypeKind;
pub use msgs::{BulkImportOutcome, MsgServer};
pub use sequencing::shift_sequences;
pub use store::{EntryStore, MemStore};
