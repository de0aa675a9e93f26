//! Logging infrastructure: the structured event journal.
//!
//! Provides [`JsonlEventJournal`], a JSONL file writer that implements
//! the [`EventJournal`](herd_application::EventJournal) port.

mod jsonl_journal;

pub use jsonl_journal::JsonlEventJournal;
