//! Ledger events and the sinks that receive them.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ledger_types::LedgerKey;

/// Which part of a ledger an update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Status,
    InterestRate,
    Payment,
    MaturityDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    LedgerCreated {
        key: LedgerKey,
    },
    LedgerUpdated {
        key: LedgerKey,
        update_type: UpdateType,
    },
    LedgerDestroyed {
        key: LedgerKey,
    },
    EntryAdded {
        key: LedgerKey,
        correlation_id: String,
    },
}

impl LedgerEvent {
    pub fn key(&self) -> &LedgerKey {
        match self {
            LedgerEvent::LedgerCreated { key }
            | LedgerEvent::LedgerUpdated { key, .. }
            | LedgerEvent::LedgerDestroyed { key }
            | LedgerEvent::EntryAdded { key, .. } => key,
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: LedgerEvent);
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: LedgerEvent) {
        match &event {
            LedgerEvent::EntryAdded {
                key,
                correlation_id,
            } => debug!(ledger = %key, correlation_id = %correlation_id, "entry added"),
            LedgerEvent::LedgerUpdated { key, update_type } => {
                debug!(ledger = %key, update = ?update_type, "ledger updated")
            }
            other => debug!(ledger = %other.key(), event = ?other, "ledger event"),
        }
    }
}

/// Keeps events in memory so callers can inspect them.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<LedgerEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: LedgerEvent) {
        self.events.lock().push(event);
    }
}
