//! Backend event stream vocabulary.
//!
//! [`entities::BackendEvent`] is the tagged union every stream frame is
//! parsed into; the session identifier is resolved once during parsing.

pub mod entities;
