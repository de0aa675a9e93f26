//! Instance entity and identity derivation

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix reserved for identities synthesized from a working directory.
///
/// Pre-configured instances use operator-chosen ids; this prefix keeps the
/// derived ones from ever colliding with them.
pub const DERIVED_ID_PREFIX: &str = "auto-";

/// Identifier of a backend instance (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap an operator-chosen identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() || id.chars().any(char::is_whitespace) {
            return Err(DomainError::InvalidInstanceId(id));
        }
        Ok(Self(id))
    }

    /// Derive the identity of an instance from its working directory.
    ///
    /// Deterministic: the same directory always yields the same id. The
    /// filesystem root has no leaf segment and maps to `auto-root`.
    pub fn from_directory(directory: &Path) -> Self {
        let leaf = directory
            .file_name()
            .map(|name| name.to_string_lossy().replace(char::is_whitespace, "-"))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "root".to_string());
        Self(format!("{DERIVED_ID_PREFIX}{leaf}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when this id was synthesized by [`from_directory`](Self::from_directory).
    pub fn is_derived(&self) -> bool {
        self.0.starts_with(DERIVED_ID_PREFIX)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How an instance came to be known to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceOrigin {
    /// Listed in the configuration file.
    Configured,
    /// Found in the host process table.
    Discovered,
    /// Spawned by this process (the only kind it may terminate).
    Launched,
}

impl fmt::Display for InstanceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstanceOrigin::Configured => "configured",
            InstanceOrigin::Discovered => "discovered",
            InstanceOrigin::Launched => "launched",
        };
        f.write_str(s)
    }
}

/// A running backend agent server bound to a project directory (Entity)
///
/// Immutable once created; the registry replaces or removes entries, it
/// never mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: InstanceId,
    pub base_url: String,
    pub working_directory: PathBuf,
    pub origin: InstanceOrigin,
}

impl Instance {
    /// Build an instance whose id is derived from its working directory.
    pub fn derived(
        base_url: impl Into<String>,
        working_directory: impl Into<PathBuf>,
        origin: InstanceOrigin,
    ) -> Self {
        let working_directory = working_directory.into();
        Self {
            id: InstanceId::from_directory(&working_directory),
            base_url: base_url.into(),
            working_directory,
            origin,
        }
    }

    /// Local base URL for a backend listening on `hostname:port`.
    pub fn local_url(hostname: &str, port: u16) -> String {
        format!("http://{hostname}:{port}")
    }

    pub fn was_launched(&self) -> bool {
        self.origin == InstanceOrigin::Launched
    }
}
