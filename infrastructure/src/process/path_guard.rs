//! Filesystem half of working-directory validation.

use herd_domain::{PROJECT_MARKERS, PathValidationError, ProjectPolicy};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Validates launch targets against a [`ProjectPolicy`].
///
/// Allow-list roots are canonicalised once at construction; roots that do
/// not exist are dropped with a warning.
#[derive(Debug, Clone)]
pub struct PathGuard {
    policy: ProjectPolicy,
    canonical_roots: Vec<PathBuf>,
}

impl PathGuard {
    pub fn new(policy: ProjectPolicy) -> Self {
        let canonical_roots = policy
            .allowed_roots
            .iter()
            .filter_map(|root| match root.canonicalize() {
                Ok(canonical) => Some(canonical),
                Err(e) => {
                    warn!("Ignoring allowed root {}: {}", root.display(), e);
                    None
                }
            })
            .collect();
        Self {
            policy,
            canonical_roots,
        }
    }

    pub fn policy(&self) -> &ProjectPolicy {
        &self.policy
    }

    /// Validate `path` and return its canonical form.
    ///
    /// Runs before anything is spawned. The deny-list is checked on both the
    /// given and the resolved path, so a symlink cannot lead into `/etc`.
    pub fn validate(&self, path: &Path) -> Result<PathBuf, PathValidationError> {
        self.policy.check_lexical(path)?;

        let canonical = path
            .canonicalize()
            .map_err(|_| PathValidationError::NotFound(path.to_path_buf()))?;
        self.policy.check_lexical(&canonical)?;
        self.policy.check_allowed(&canonical, &self.canonical_roots)?;

        if !canonical.is_dir() {
            return Err(PathValidationError::NotADirectory(canonical));
        }
        if !has_project_marker(&canonical) {
            return Err(PathValidationError::NoProjectMarker(canonical));
        }
        Ok(canonical)
    }
}

pub fn has_project_marker(dir: &Path) -> bool {
    PROJECT_MARKERS.iter().any(|marker| dir.join(marker).exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard_for(root: &Path) -> PathGuard {
        PathGuard::new(ProjectPolicy::new(vec![root.to_path_buf()], false))
    }

    fn project(root: &TempDir, name: &str, marker: Option<&str>) -> PathBuf {
        let dir = root.path().join(name);
        std::fs::create_dir_all(&dir).unwrap();
        if let Some(marker) = marker {
            if marker.starts_with('.') {
                std::fs::create_dir(dir.join(marker)).unwrap();
            } else {
                std::fs::write(dir.join(marker), "").unwrap();
            }
        }
        dir
    }

    #[test]
    fn test_accepts_marked_project_under_root() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(&root, "app", Some(".git"));
        let canonical = guard_for(root.path()).validate(&dir).unwrap();
        assert_eq!(canonical, dir.canonicalize().unwrap());
    }

    #[test]
    fn test_rejects_missing_marker() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(&root, "plain", None);
        let err = guard_for(root.path()).validate(&dir).unwrap_err();
        assert!(matches!(err, PathValidationError::NoProjectMarker(_)));
    }

    #[test]
    fn test_rejects_traversal_even_if_it_resolves() {
        let root = tempfile::tempdir().unwrap();
        project(&root, "app", Some("Cargo.toml"));
        let sneaky = root.path().join("app").join("..").join("app");
        let err = guard_for(root.path()).validate(&sneaky).unwrap_err();
        assert!(matches!(err, PathValidationError::Traversal(_)));
    }

    #[test]
    fn test_rejects_system_directory() {
        let guard = PathGuard::new(ProjectPolicy::new(vec![], true));
        let err = guard.validate(Path::new("/etc")).unwrap_err();
        assert!(matches!(err, PathValidationError::Denied(_)));
    }

    #[test]
    fn test_rejects_outside_allow_list() {
        let root = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let dir = project(&elsewhere, "app", Some("package.json"));
        let err = guard_for(root.path()).validate(&dir).unwrap_err();
        assert!(matches!(err, PathValidationError::OutsideAllowList(_)));
    }

    #[test]
    fn test_unrestricted_skips_allow_list() {
        let elsewhere = tempfile::tempdir().unwrap();
        let dir = project(&elsewhere, "app", Some("go.mod"));
        let guard = PathGuard::new(ProjectPolicy::new(vec![], true));
        assert!(guard.validate(&dir).is_ok());
    }

    #[test]
    fn test_rejects_missing_and_file_paths() {
        let root = tempfile::tempdir().unwrap();
        let guard = guard_for(root.path());

        let err = guard.validate(&root.path().join("nope")).unwrap_err();
        assert!(matches!(err, PathValidationError::NotFound(_)));

        let file = root.path().join("notes.txt");
        std::fs::write(&file, "x").unwrap();
        let err = guard.validate(&file).unwrap_err();
        assert!(matches!(err, PathValidationError::NotADirectory(_)));
    }

    #[test]
    fn test_rejects_relative_path() {
        let root = tempfile::tempdir().unwrap();
        let err = guard_for(root.path()).validate(Path::new("app")).unwrap_err();
        assert!(matches!(err, PathValidationError::NotAbsolute(_)));
    }
}
