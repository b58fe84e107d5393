//! Shared types for the asset-ledger workspace.
//!
//! - [`model`]: ledgers, entries, buckets and class configuration
//! - [`chunk`]: bulk import records and messages
//! - [`validation`]: stateless field rules
//! - [`error`]: the [`LedgerError`] taxonomy

pub mod amount;
pub mod chunk;
pub mod dates;
pub mod env_utils;
pub mod error;
pub mod model;
pub mod validation;

pub use amount::Amount;
pub use chunk::{ImportChunk, LedgerToEntries, MsgBulkImport};
pub use error::{LedgerError, LedgerResult};
pub use model::{
    BucketBalance, DayCountConvention, InterestAccrualMethod, Ledger, LedgerBucketAmount,
    LedgerClass, LedgerClassBucketType, LedgerClassEntryType, LedgerClassStatusType,
    LedgerClassType, LedgerEntry, LedgerKey, PaymentFrequency,
};
pub use validation::{MAX_ENTRY_SEQUENCE, MAX_INTEREST_RATE};
