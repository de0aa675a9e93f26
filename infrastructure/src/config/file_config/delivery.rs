//! Delivery configuration from TOML (`[delivery]` section)

use herd_application::RoutingConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDeliveryConfig {
    /// Buffered assistant text is flushed once it reaches this many characters
    pub chunk_threshold: usize,
    /// Ceiling of one outbound message, in characters
    pub max_message_length: usize,
}

impl Default for FileDeliveryConfig {
    fn default() -> Self {
        let routing = RoutingConfig::default();
        Self {
            chunk_threshold: routing.chunk_threshold,
            max_message_length: routing.max_message_length,
        }
    }
}

impl FileDeliveryConfig {
    pub fn to_routing_config(&self) -> RoutingConfig {
        RoutingConfig {
            chunk_threshold: self.chunk_threshold,
            max_message_length: self.max_message_length,
        }
    }
}
