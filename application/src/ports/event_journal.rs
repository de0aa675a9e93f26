//! Port for the structured event journal.
//!
//! Defines the [`EventJournal`] trait for recording what the router did with
//! every event (instance, kind, session, resolved user, outcome).
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while this port captures a machine-readable
//! routing record (JSONL).

use serde_json::Value;

/// One journal entry.
///
/// Each entry has a type string and a JSON payload; the adapter stamps the
/// UTC timestamp when it writes.
pub struct JournalEntry {
    /// Entry type identifier (e.g., "event_routed", "instance_registered").
    pub entry_type: &'static str,
    /// JSON payload with entry-specific data.
    pub payload: Value,
}

impl JournalEntry {
    pub fn new(entry_type: &'static str, payload: Value) -> Self {
        Self {
            entry_type,
            payload,
        }
    }
}

/// Port for recording journal entries.
///
/// `record` is synchronous and non-fallible so it never disrupts routing;
/// write failures are ignored by the adapter.
pub trait EventJournal: Send + Sync {
    fn record(&self, entry: JournalEntry);
}

/// No-op implementation for tests and when the journal is disabled.
pub struct NoEventJournal;

impl EventJournal for NoEventJournal {
    fn record(&self, _entry: JournalEntry) {}
}
