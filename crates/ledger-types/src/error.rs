//! Error taxonomy shared by every ledger operation.

use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A value is malformed or out of range.
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// A required value was not provided.
    #[error("missing field: {0}")]
    MissingField(String),

    /// The signer may not perform the mutation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Store, registry or codec failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }

    /// Stable numeric code, used as the result code of a rejected transaction.
    pub fn code(&self) -> u32 {
        match self {
            Self::InvalidField { .. } => 2,
            Self::MissingField(_) => 3,
            Self::Unauthorized(_) => 4,
            Self::AlreadyExists(_) => 5,
            Self::NotFound(_) => 6,
            Self::Internal(_) => 1,
        }
    }

    /// Prefix the field path of an `InvalidField` error, e.g. `entries[2].sequence`.
    pub fn within(self, parent: &str) -> Self {
        match self {
            Self::InvalidField { field, reason } => Self::InvalidField {
                field: format!("{}.{}", parent, field),
                reason,
            },
            Self::MissingField(field) => Self::MissingField(format!("{}.{}", parent, field)),
            other => other,
        }
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {}", e))
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
