//! Event routing use case
//!
//! Takes every parsed frame from every instance's stream, finds the user
//! who owns the frame's session on that instance, and dispatches by kind:
//!
//! - text deltas go through the [`DeltaAssembler`]
//! - assistant completion flushes the assembler
//! - `busy` status shows a typing indicator
//! - permission, todo and error events are formatted and delivered
//!
//! Everything delivered passes through the outbound chunker. Nothing here
//! fails outward: misses and delivery failures are logged and the event is
//! done with.

use crate::config::RoutingConfig;
use crate::ports::delivery::{DeliveryOutcome, MessageDelivery};
use crate::ports::event_journal::{EventJournal, JournalEntry};
use crate::ports::event_sink::EventSink;
use crate::ports::notice_formatter::NoticeFormatter;
use crate::use_cases::correlation::SessionCorrelator;
use crate::use_cases::delta_assembler::DeltaAssembler;
use async_trait::async_trait;
use herd_domain::{BackendEvent, InstanceId, SessionActivity, chunk};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// What the router did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to a handler on behalf of `user_id`.
    Dispatched { user_id: String },
    /// The frame carries no session id (connection lifecycle frames).
    NoSessionId,
    /// No tracked user owns the session on this instance.
    CorrelationMiss { session_id: String },
    /// A kind with no handler.
    Ignored { event_type: String },
    /// The user store could not be read.
    StoreUnavailable,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Dispatched { .. } => "dispatched",
            RouteOutcome::NoSessionId => "no_session_id",
            RouteOutcome::CorrelationMiss { .. } => "correlation_miss",
            RouteOutcome::Ignored { .. } => "ignored",
            RouteOutcome::StoreUnavailable => "store_unavailable",
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            RouteOutcome::Dispatched { user_id } => Some(user_id),
            _ => None,
        }
    }
}

pub struct EventRouter {
    correlator: Arc<SessionCorrelator>,
    assembler: DeltaAssembler,
    delivery: Arc<dyn MessageDelivery>,
    formatter: Arc<dyn NoticeFormatter>,
    journal: Arc<dyn EventJournal>,
    max_message_length: usize,
}

impl EventRouter {
    pub fn new(
        config: RoutingConfig,
        correlator: Arc<SessionCorrelator>,
        delivery: Arc<dyn MessageDelivery>,
        formatter: Arc<dyn NoticeFormatter>,
        journal: Arc<dyn EventJournal>,
    ) -> Self {
        Self {
            correlator,
            assembler: DeltaAssembler::new(config.chunk_threshold),
            delivery,
            formatter,
            journal,
            max_message_length: config.max_message_length,
        }
    }

    pub fn assembler(&self) -> &DeltaAssembler {
        &self.assembler
    }

    /// Route one event from `instance_id`.
    pub async fn route(&self, instance_id: &InstanceId, event: &BackendEvent) -> RouteOutcome {
        let outcome = self.resolve_and_dispatch(instance_id, event).await;

        self.journal.record(JournalEntry::new(
            "event_routed",
            json!({
                "instance_id": instance_id.as_str(),
                "event_type": event.event_type(),
                "session_id": event.session_id(),
                "user_id": outcome.user_id(),
                "outcome": outcome.as_str(),
            }),
        ));
        outcome
    }

    async fn resolve_and_dispatch(
        &self,
        instance_id: &InstanceId,
        event: &BackendEvent,
    ) -> RouteOutcome {
        if let BackendEvent::Other { event_type, .. } = event {
            trace!("Ignoring {} from {}", event_type, instance_id);
            return RouteOutcome::Ignored {
                event_type: event_type.clone(),
            };
        }

        let Some(session_id) = event.session_id() else {
            debug!(
                "Dropping {} from {}: no session id",
                event.event_type(),
                instance_id
            );
            return RouteOutcome::NoSessionId;
        };

        let user_id = match self.correlator.resolve(session_id, instance_id).await {
            Ok(Some(user_id)) => user_id,
            Ok(None) => {
                warn!(
                    "No tracked user owns session {} on {}; dropping {}",
                    session_id,
                    instance_id,
                    event.event_type()
                );
                return RouteOutcome::CorrelationMiss {
                    session_id: session_id.to_string(),
                };
            }
            Err(e) => {
                error!("User store unavailable while routing {}: {}", session_id, e);
                return RouteOutcome::StoreUnavailable;
            }
        };

        self.dispatch(&user_id, instance_id, event).await;
        RouteOutcome::Dispatched { user_id }
    }

    async fn dispatch(&self, user_id: &str, instance_id: &InstanceId, event: &BackendEvent) {
        match event {
            BackendEvent::MessagePartUpdated(part) => {
                if let Some(delta) = part.text_delta()
                    && let Some(text) = self.assembler.append(user_id, instance_id, delta)
                {
                    self.deliver(user_id, &text).await;
                }
            }
            BackendEvent::MessageUpdated(message) => {
                if message.is_assistant_completion()
                    && let Some(text) = self.assembler.complete(user_id, instance_id)
                {
                    self.deliver(user_id, &text).await;
                }
            }
            BackendEvent::SessionStatus(status) => {
                if status.activity == SessionActivity::Busy {
                    self.delivery.typing(user_id).await;
                }
            }
            BackendEvent::PermissionUpdated(request) => {
                let text = self.formatter.permission(instance_id, request);
                self.deliver(user_id, &text).await;
            }
            BackendEvent::TodoUpdated(update) => {
                let text = self.formatter.todos(update);
                self.deliver(user_id, &text).await;
            }
            BackendEvent::SessionError(failure) => {
                // Partial output before the failure would otherwise leak
                // into the next response.
                if let Some(text) = self.assembler.complete(user_id, instance_id) {
                    self.deliver(user_id, &text).await;
                }
                let text = self.formatter.session_error(failure);
                self.deliver(user_id, &text).await;
            }
            BackendEvent::Other { .. } => {}
        }
    }

    async fn deliver(&self, user_id: &str, text: &str) {
        for piece in chunk(text, self.max_message_length) {
            if let DeliveryOutcome::Failed(e) = self.delivery.deliver(user_id, &piece).await {
                warn!("Delivery to {} failed: {}", user_id, e);
            }
        }
    }
}

#[async_trait]
impl EventSink for EventRouter {
    async fn on_event(&self, instance_id: &InstanceId, event: BackendEvent) {
        self.route(instance_id, &event).await;
    }
}
