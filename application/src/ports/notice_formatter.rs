//! Notice formatting port
//!
//! Turns non-text events into user-facing text. Implementations live in the
//! presentation layer.

use herd_domain::{InstanceId, PermissionRequest, SessionFailure, TodoUpdate};

pub trait NoticeFormatter: Send + Sync {
    /// Prompt asking the user to allow or deny a tool permission.
    fn permission(&self, instance_id: &InstanceId, request: &PermissionRequest) -> String;

    /// Progress summary of the session's todo list.
    fn todos(&self, update: &TodoUpdate) -> String;

    /// The backend's error text verbatim, plus guidance.
    fn session_error(&self, failure: &SessionFailure) -> String;
}
