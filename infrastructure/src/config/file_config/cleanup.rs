//! Session retention from TOML (`[cleanup]` section)

use herd_application::CleanupPolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCleanupConfig {
    pub interval_secs: u64,
    pub max_session_age_hours: u64,
}

impl Default for FileCleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            max_session_age_hours: 168,
        }
    }
}

impl FileCleanupConfig {
    pub fn to_policy(&self) -> CleanupPolicy {
        CleanupPolicy::from_hours(self.interval_secs, self.max_session_age_hours)
    }
}
