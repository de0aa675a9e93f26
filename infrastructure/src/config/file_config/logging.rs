//! Log output configuration from TOML (`[logging]` section)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// Directory for daily-rotated log files; stderr only when unset
    pub directory: Option<PathBuf>,
    /// Path of the JSONL event journal; disabled when unset
    pub journal: Option<PathBuf>,
}
