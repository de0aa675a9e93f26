//! Project directory policy from TOML (`[projects]` section)

use herd_domain::ProjectPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProjectsConfig {
    /// Roots under which instances may be launched
    pub allowed_roots: Vec<PathBuf>,
    /// Disable the allow-list (trusted hosts only)
    pub unrestricted: bool,
}

impl FileProjectsConfig {
    pub fn to_policy(&self) -> ProjectPolicy {
        ProjectPolicy::new(self.allowed_roots.clone(), self.unrestricted)
    }
}
