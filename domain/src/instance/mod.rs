//! Backend instances.
//!
//! - [`entities::Instance`] — one running backend server bound to a project
//! - [`entities::InstanceId`] — stable identity, derived from the working directory

pub mod entities;
