//! User session bookkeeping.
//!
//! - [`entities::Session`] — a conversation on one instance
//! - [`entities::UserState`] — a user's sessions and current selection

pub mod entities;
