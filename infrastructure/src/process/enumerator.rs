//! OS process enumeration.
//!
//! Discovery only needs three things from the host: the process list, each
//! process's argv, and each process's working directory. All three come
//! from one `sysinfo` refresh.

use async_trait::async_trait;
use std::path::PathBuf;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Failed to list processes: {0}")]
    Enumeration(String),
}

/// One host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub args: Vec<String>,
    /// `None` when the directory cannot be read (exited, no permission).
    pub cwd: Option<PathBuf>,
}

#[async_trait]
pub trait ProcessEnumerator: Send + Sync {
    async fn processes(&self) -> Result<Vec<ProcessInfo>, DiscoveryError>;
}

/// Enumerator backed by `sysinfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessEnumerator;

impl SystemProcessEnumerator {
    pub fn new() -> Self {
        Self
    }

    fn snapshot() -> Vec<ProcessInfo> {
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::Always)
                .with_cwd(UpdateKind::Always),
        );

        let processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                let args: Vec<String> = process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect();
                // Kernel threads and zombies have no argv.
                (!args.is_empty()).then(|| ProcessInfo {
                    pid: pid.as_u32(),
                    args,
                    cwd: process.cwd().map(|cwd| cwd.to_path_buf()),
                })
            })
            .collect();
        trace!("Process table holds {} process(es) with argv", processes.len());
        processes
    }
}

#[async_trait]
impl ProcessEnumerator for SystemProcessEnumerator {
    async fn processes(&self) -> Result<Vec<ProcessInfo>, DiscoveryError> {
        tokio::task::spawn_blocking(Self::snapshot)
            .await
            .map_err(|e| DiscoveryError::Enumeration(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_lists_current_process() {
        let me = std::process::id();
        let processes = SystemProcessEnumerator::new().processes().await.unwrap();
        let this = processes.iter().find(|p| p.pid == me).unwrap();

        assert!(!this.args.is_empty());
        assert_eq!(this.cwd, Some(std::env::current_dir().unwrap()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_argv_keeps_spaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut child = tokio::process::Command::new("sh")
            .args(["-c", "sleep 30; :", "opencode serve", "--port", "4100"])
            .current_dir(dir.path())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        let processes = SystemProcessEnumerator::new().processes().await.unwrap();
        let spawned = processes.iter().find(|p| p.pid == pid).unwrap();
        assert!(spawned.args.iter().any(|arg| arg == "opencode serve"));

        child.start_kill().unwrap();
    }
}
