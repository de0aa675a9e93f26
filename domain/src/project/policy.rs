//! Rules deciding where a backend instance may be launched.
//!
//! The filesystem-dependent half of the check (canonicalisation, existence,
//! marker lookup) lives in the infrastructure path guard; this module holds
//! the fixed lists, the lexical checks, and the error vocabulary.

use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Files or directories that identify a project root.
pub const PROJECT_MARKERS: &[&str] = &[
    ".git",
    ".opencode",
    "opencode.json",
    "package.json",
    "Cargo.toml",
    "pyproject.toml",
    "go.mod",
    "requirements.txt",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    "deno.json",
    "Makefile",
];

/// System directories that may never host an instance, nor anything under them.
pub const DENIED_ROOTS: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr", "/var",
    "/System", "/Library",
];

/// Why a working directory was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathValidationError {
    #[error("Path must be absolute: {0}")]
    NotAbsolute(PathBuf),

    #[error("Path must not contain '..' segments: {0}")]
    Traversal(PathBuf),

    #[error("Path is inside a protected system directory: {0}")]
    Denied(PathBuf),

    #[error("Path is outside the allowed project roots: {0}")]
    OutsideAllowList(PathBuf),

    #[error("Path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("No project marker (e.g. .git, package.json, Cargo.toml) found in {0}")]
    NoProjectMarker(PathBuf),
}

impl PathValidationError {
    /// The offending path, for display next to the reason.
    pub fn path(&self) -> &Path {
        match self {
            PathValidationError::NotAbsolute(p)
            | PathValidationError::Traversal(p)
            | PathValidationError::Denied(p)
            | PathValidationError::OutsideAllowList(p)
            | PathValidationError::NotFound(p)
            | PathValidationError::NotADirectory(p)
            | PathValidationError::NoProjectMarker(p) => p,
        }
    }
}

/// Where projects may live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPolicy {
    /// Roots under which instances may be launched.
    pub allowed_roots: Vec<PathBuf>,
    /// Skip the allow-list entirely (trusted hosts only).
    pub unrestricted: bool,
}

impl ProjectPolicy {
    pub fn new(allowed_roots: Vec<PathBuf>, unrestricted: bool) -> Self {
        Self {
            allowed_roots,
            unrestricted,
        }
    }

    /// Checks that need no filesystem access: absolute, no `..`, not denied.
    pub fn check_lexical(&self, path: &Path) -> Result<(), PathValidationError> {
        if !path.is_absolute() {
            return Err(PathValidationError::NotAbsolute(path.to_path_buf()));
        }
        if has_traversal(path) {
            return Err(PathValidationError::Traversal(path.to_path_buf()));
        }
        if is_denied(path) {
            return Err(PathValidationError::Denied(path.to_path_buf()));
        }
        Ok(())
    }

    /// Allow-list membership of an already canonical path.
    ///
    /// `roots` must be canonical too; the caller resolves them once.
    pub fn check_allowed(&self, canonical: &Path, roots: &[PathBuf]) -> Result<(), PathValidationError> {
        if self.unrestricted || roots.iter().any(|root| canonical.starts_with(root)) {
            Ok(())
        } else {
            Err(PathValidationError::OutsideAllowList(canonical.to_path_buf()))
        }
    }
}

pub fn has_traversal(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// The filesystem root itself, or anything under a denied system directory.
pub fn is_denied(path: &Path) -> bool {
    if path.parent().is_none() {
        return true;
    }
    DENIED_ROOTS.iter().any(|root| path.starts_with(root))
}
