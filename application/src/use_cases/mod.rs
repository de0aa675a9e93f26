//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod cleanup;
pub mod correlation;
pub mod delta_assembler;
pub mod route_event;
pub mod user_sessions;
