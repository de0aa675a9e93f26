//! Event stream configuration from TOML (`[stream]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStreamConfig {
    /// Fixed pause before reconnecting a dropped stream
    pub reconnect_delay_ms: u64,
    /// Timeout for opening the stream (not for reading it)
    pub connect_timeout_secs: u64,
}

impl Default for FileStreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 2000,
            connect_timeout_secs: 10,
        }
    }
}

impl FileStreamConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
