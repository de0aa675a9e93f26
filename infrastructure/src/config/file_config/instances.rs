//! Pre-configured instances from TOML (`[[instances]]` array)

use herd_domain::{DomainError, Instance, InstanceId, InstanceOrigin};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A backend server started outside this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInstanceConfig {
    pub id: String,
    pub url: String,
    pub directory: PathBuf,
}

impl FileInstanceConfig {
    pub fn to_instance(&self) -> Result<Instance, DomainError> {
        Ok(Instance {
            id: InstanceId::new(&self.id)?,
            base_url: self.url.trim_end_matches('/').to_string(),
            working_directory: self.directory.clone(),
            origin: InstanceOrigin::Configured,
        })
    }
}
