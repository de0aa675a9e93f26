//! Event sink port
//!
//! Every event stream client hands each parsed frame, together with the id
//! of the instance it came from, to one [`EventSink`].

use async_trait::async_trait;
use herd_domain::{BackendEvent, InstanceId};

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Called once per frame, in wire order for a given instance.
    ///
    /// Must not fail; a sink absorbs its own errors.
    async fn on_event(&self, instance_id: &InstanceId, event: BackendEvent);
}
