//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into domain and
//! application types where needed.

mod backend;
mod cleanup;
mod delivery;
mod instances;
mod logging;
mod projects;
mod stream;

pub use backend::FileBackendConfig;
pub use cleanup::FileCleanupConfig;
pub use delivery::FileDeliveryConfig;
pub use instances::FileInstanceConfig;
pub use logging::FileLoggingConfig;
pub use projects::FileProjectsConfig;
pub use stream::FileStreamConfig;

use herd_domain::InstanceId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("{0} cannot be 0")]
    Zero(&'static str),

    #[error("instance id '{0}' is invalid (empty or contains whitespace)")]
    InvalidInstanceId(String),

    #[error("instance id '{0}' uses the reserved prefix 'auto-'")]
    ReservedInstanceId(String),

    #[error("instance id '{0}' is configured more than once")]
    DuplicateInstanceId(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend launch and request settings
    pub backend: FileBackendConfig,
    /// Event stream settings
    pub stream: FileStreamConfig,
    /// Outbound delivery settings
    pub delivery: FileDeliveryConfig,
    /// Where instances may be launched
    pub projects: FileProjectsConfig,
    /// Instances started outside this process
    pub instances: Vec<FileInstanceConfig>,
    /// Idle session retention
    pub cleanup: FileCleanupConfig,
    /// Log file and event journal locations
    pub logging: FileLoggingConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        let zero_checks = [
            ("delivery.max_message_length", self.delivery.max_message_length == 0),
            ("delivery.chunk_threshold", self.delivery.chunk_threshold == 0),
            ("backend.port_probe_attempts", self.backend.port_probe_attempts == 0),
            ("backend.health_retries", self.backend.health_retries == 0),
        ];
        for (field, is_zero) in zero_checks {
            if is_zero {
                issues.push(ConfigValidationError::Zero(field));
            }
        }

        let mut seen = HashSet::new();
        for instance in &self.instances {
            match InstanceId::new(&instance.id) {
                Err(_) => issues.push(ConfigValidationError::InvalidInstanceId(
                    instance.id.clone(),
                )),
                Ok(id) if id.is_derived() => issues.push(
                    ConfigValidationError::ReservedInstanceId(instance.id.clone()),
                ),
                Ok(_) => {}
            }
            if !seen.insert(instance.id.as_str()) {
                issues.push(ConfigValidationError::DuplicateInstanceId(
                    instance.id.clone(),
                ));
            }
        }

        issues
    }
}
