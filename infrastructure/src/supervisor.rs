//! Stream supervision.
//!
//! Couples the [`InstanceRegistry`] with one [`EventStreamClient`] task per
//! registered instance. Every stream gets a child of the supervisor's root
//! cancellation token, so one instance can be detached alone and
//! [`shutdown`](Supervisor::shutdown) stops them all.

use crate::opencode::{EventStreamClient, EventStreamConfig};
use herd_application::{BackendClient, EventSink, InstanceRegistry, RegisteredInstance};
use herd_domain::{Instance, InstanceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const STREAM_STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct StreamTask {
    cancellation: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct Supervisor {
    registry: Arc<InstanceRegistry>,
    sink: Option<Arc<dyn EventSink>>,
    stream_config: EventStreamConfig,
    streams: Mutex<HashMap<InstanceId, StreamTask>>,
    root: CancellationToken,
}

impl Supervisor {
    /// Without a `sink`, instances are registered but not subscribed.
    pub fn new(
        registry: Arc<InstanceRegistry>,
        sink: Option<Arc<dyn EventSink>>,
        stream_config: EventStreamConfig,
    ) -> Self {
        Self {
            registry,
            sink,
            stream_config,
            streams: Mutex::new(HashMap::new()),
            root: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<InstanceRegistry> {
        &self.registry
    }

    /// Register an instance and start its event stream.
    ///
    /// If the id is already registered the existing entry is returned and
    /// nothing new is started.
    pub fn attach(&self, instance: Instance, client: Arc<dyn BackendClient>) -> RegisteredInstance {
        let (entry, inserted) = self.registry.register(instance, client);
        if inserted {
            self.subscribe(&entry.instance);
        }
        entry
    }

    /// Start the event stream of `instance` unless one is running.
    pub fn subscribe(&self, instance: &Instance) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };

        let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        if streams
            .get(&instance.id)
            .is_some_and(|task| !task.handle.is_finished())
        {
            return false;
        }

        let client = match EventStreamClient::new(instance, sink.clone(), self.stream_config) {
            Ok(client) => client,
            Err(e) => {
                error!("Cannot build event stream client for {}: {}", instance.id, e);
                return false;
            }
        };
        let cancellation = self.root.child_token();
        let handle = tokio::spawn(client.run(cancellation.clone()));
        streams.insert(
            instance.id.clone(),
            StreamTask {
                cancellation,
                handle,
            },
        );
        debug!("Started event stream for {}", instance.id);
        true
    }

    pub fn is_subscribed(&self, id: &InstanceId) -> bool {
        let streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
        streams.get(id).is_some_and(|task| !task.handle.is_finished())
    }

    /// Stop an instance's stream and unregister it.
    ///
    /// The backend process, if this process spawned it, keeps running until
    /// the launcher shuts down.
    pub fn detach(&self, id: &InstanceId) -> Option<RegisteredInstance> {
        let task = {
            let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
            streams.remove(id)
        };
        if let Some(task) = task {
            task.cancellation.cancel();
        }
        self.registry.unregister(id)
    }

    /// Cancel every stream and wait briefly for the tasks to finish.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let tasks: Vec<(InstanceId, StreamTask)> = {
            let mut streams = self.streams.lock().unwrap_or_else(|e| e.into_inner());
            streams.drain().collect()
        };

        for (id, task) in tasks {
            match tokio::time::timeout(STREAM_STOP_TIMEOUT, task.handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Event stream task for {} failed: {}", id, e),
                Err(_) => warn!("Event stream for {} did not stop in time", id),
            }
        }
        info!("All event streams stopped");
    }
}
