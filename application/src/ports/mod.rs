//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod backend;
pub mod delivery;
pub mod event_journal;
pub mod event_sink;
pub mod notice_formatter;
pub mod user_store;
