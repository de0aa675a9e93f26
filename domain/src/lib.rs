//! Domain layer for herd
//!
//! This crate contains the entities and pure logic of the supervisor.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Instance**: one backend agent server bound to a project directory and a port
//! - **Session**: a conversation created on one instance, owned by one user
//! - **UserState**: a user's sessions plus the current selection
//! - **BackendEvent**: a parsed event-stream frame, with its session id resolved
//! - **Chunking**: splitting outbound text under a transport size limit

pub mod core;
pub mod event;
pub mod instance;
pub mod project;
pub mod session;
pub mod text;

// Re-export commonly used types
pub use self::core::{
    error::DomainError,
    string::{preview, truncate},
};
pub use event::entities::{
    BackendEvent, MessageRole, MessageUpdate, PartKind, PartUpdate, PermissionRequest,
    SessionActivity, SessionFailure, StatusUpdate, TodoItem, TodoUpdate,
};
pub use instance::entities::{DERIVED_ID_PREFIX, Instance, InstanceId, InstanceOrigin};
pub use project::policy::{PROJECT_MARKERS, PathValidationError, ProjectPolicy};
pub use session::entities::{Session, USER_KEY_PREFIX, UserState};
pub use text::chunker::{PARAGRAPH_SEPARATOR, chunk};
