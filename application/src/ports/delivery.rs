//! Outbound delivery port
//!
//! The transport that carries text to an end user is an external
//! collaborator. The router hands it already-chunked text.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Recipient {0} is unreachable")]
    Unreachable(String),

    #[error("Message rejected by transport: {0}")]
    Rejected(String),
}

/// Result of handing one message to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

impl From<Result<(), DeliveryError>> for DeliveryOutcome {
    fn from(result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => DeliveryOutcome::Delivered,
            Err(e) => DeliveryOutcome::Failed(e),
        }
    }
}

#[async_trait]
pub trait MessageDelivery: Send + Sync {
    /// Deliver one message. Implementations must not split `text` further.
    async fn deliver(&self, user_id: &str, text: &str) -> DeliveryOutcome;

    /// Show a "working on it" indicator, where the transport has one.
    async fn typing(&self, _user_id: &str) {}
}

/// Delivery that drops everything, for tests and headless runs.
pub struct NoDelivery;

#[async_trait]
impl MessageDelivery for NoDelivery {
    async fn deliver(&self, _user_id: &str, _text: &str) -> DeliveryOutcome {
        DeliveryOutcome::Delivered
    }
}
