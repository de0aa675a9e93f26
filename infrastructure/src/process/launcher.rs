//! Instance launcher.
//!
//! Spawns backend servers for project directories and owns the resulting
//! child processes. Only children spawned here are ever terminated; a
//! discovered or pre-configured instance is never touched.
//!
//! Launch steps:
//! 1. validate the directory ([`PathGuard`])
//! 2. reuse an instance already registered or discoverable for it
//! 3. allocate a port from the launch base
//! 4. spawn the backend bound to that port, in that directory
//! 5. poll the health probe until it passes or retries run out
//! 6. register the instance and start its event stream

use super::discovery::ProcessDiscoverer;
use super::path_guard::PathGuard;
use super::port::{NoPortAvailable, find_available_port};
use crate::config::FileBackendConfig;
use crate::supervisor::Supervisor;
use herd_application::{BackendClient, BackendConnector, BackendError};
use herd_domain::{Instance, InstanceId, InstanceOrigin, PathValidationError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, trace, warn};

const CHILD_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error(transparent)]
    PathValidation(#[from] PathValidationError),

    #[error("No free port among {attempts} ports starting at {start}")]
    NoPortAvailable { start: u16, attempts: u16 },

    #[error("Backend command '{0}' not found")]
    CommandNotFound(String),

    #[error("Failed to spawn backend: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Instance {instance_id} not healthy after {attempts} probes")]
    LaunchTimeout {
        instance_id: InstanceId,
        attempts: u32,
    },

    #[error("Instance id {id} is already used by {}", existing.display())]
    IdCollision { id: InstanceId, existing: PathBuf },

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl From<NoPortAvailable> for LaunchError {
    fn from(e: NoPortAvailable) -> Self {
        LaunchError::NoPortAvailable {
            start: e.start,
            attempts: e.attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub command: String,
    pub args: Vec<String>,
    pub hostname: String,
    pub launch_base_port: u16,
    pub port_probe_attempts: u16,
    pub health_interval: Duration,
    pub health_retries: u32,
}

impl From<&FileBackendConfig> for LauncherConfig {
    fn from(backend: &FileBackendConfig) -> Self {
        Self {
            command: backend.command.clone(),
            args: backend.args.clone(),
            hostname: backend.hostname.clone(),
            launch_base_port: backend.launch_base_port,
            port_probe_attempts: backend.port_probe_attempts,
            health_interval: backend.health_interval(),
            health_retries: backend.health_retries,
        }
    }
}

struct SpawnedChild {
    instance_id: InstanceId,
    child: Child,
}

pub struct InstanceLauncher {
    config: LauncherConfig,
    guard: PathGuard,
    discoverer: Arc<ProcessDiscoverer>,
    connector: Arc<dyn BackendConnector>,
    supervisor: Arc<Supervisor>,
    children: Mutex<Vec<SpawnedChild>>,
    /// Serializes launches so two requests for one directory spawn once.
    launch_lock: tokio::sync::Mutex<()>,
}

impl InstanceLauncher {
    pub fn new(
        config: LauncherConfig,
        guard: PathGuard,
        discoverer: Arc<ProcessDiscoverer>,
        connector: Arc<dyn BackendConnector>,
        supervisor: Arc<Supervisor>,
    ) -> Self {
        Self {
            config,
            guard,
            discoverer,
            connector,
            supervisor,
            children: Mutex::new(Vec::new()),
            launch_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Launch (or reuse) the instance for `working_directory`.
    pub async fn launch(&self, working_directory: &Path) -> Result<Instance, LaunchError> {
        let directory = self.guard.validate(working_directory)?;
        let _launching = self.launch_lock.lock().await;

        if let Some(existing) = self.supervisor.registry().find_by_directory(&directory) {
            debug!("Reusing registered instance {}", existing.instance.id);
            return Ok(existing.instance);
        }

        let instance_id = InstanceId::from_directory(&directory);
        if let Some(taken) = self.supervisor.registry().get(&instance_id) {
            return Err(LaunchError::IdCollision {
                id: instance_id,
                existing: taken.instance.working_directory,
            });
        }

        match self.discoverer.find_existing_instance_for_path(&directory).await {
            Ok(Some(found)) => {
                info!("Adopting running backend {} at {}", found.id, found.base_url);
                let found = Instance {
                    working_directory: directory.clone(),
                    ..found
                };
                let client = self
                    .connector
                    .connect(&found.base_url, &found.working_directory)?;
                return Ok(self.supervisor.attach(found, client).instance);
            }
            Ok(None) => {}
            Err(e) => warn!("Discovery failed, launching a new backend: {}", e),
        }

        let port = find_available_port(
            &self.config.hostname,
            self.config.launch_base_port,
            self.config.port_probe_attempts,
        )
        .await?;

        let instance = Instance {
            id: instance_id,
            base_url: Instance::local_url(&self.config.hostname, port),
            working_directory: directory,
            origin: InstanceOrigin::Launched,
        };
        let mut child = self.spawn_backend(&instance, port)?;
        let client = self
            .connector
            .connect(&instance.base_url, &instance.working_directory)?;

        let healthy = self
            .wait_healthy(&instance.id, &mut child, client.as_ref())
            .await;
        // Tracked whether or not it became healthy: a slow starter is
        // still cleaned up at shutdown.
        self.track(instance.id.clone(), child);
        healthy?;

        info!(
            "Launched {} on port {} for {}",
            instance.id,
            port,
            instance.working_directory.display()
        );
        Ok(self.supervisor.attach(instance, client).instance)
    }

    fn spawn_backend(&self, instance: &Instance, port: u16) -> Result<Child, LaunchError> {
        let program = which::which(&self.config.command)
            .map_err(|_| LaunchError::CommandNotFound(self.config.command.clone()))?;
        debug!(
            "Spawning {} {} --hostname {} --port {} in {}",
            program.display(),
            self.config.args.join(" "),
            self.config.hostname,
            port,
            instance.working_directory.display()
        );

        let mut cmd = Command::new(program);
        cmd.args(&self.config.args)
            .arg("--hostname")
            .arg(&self.config.hostname)
            .arg("--port")
            .arg(port.to_string())
            .current_dir(&instance.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Linux: request kernel to send SIGTERM to child when parent dies.
        // This catches cases where shutdown doesn't run (SIGKILL, OOM kill).
        #[cfg(target_os = "linux")]
        unsafe {
            cmd.pre_exec(|| {
                libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM);
                Ok(())
            });
        }

        let mut child = cmd.spawn()?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(log_output(instance.id.clone(), "stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_output(instance.id.clone(), "stderr", stderr));
        }
        Ok(child)
    }

    /// Poll the health probe. An early child exit is logged, not fatal;
    /// the probe decides.
    async fn wait_healthy(
        &self,
        instance_id: &InstanceId,
        child: &mut Child,
        client: &dyn BackendClient,
    ) -> Result<(), LaunchError> {
        let mut exit_reported = false;
        for attempt in 1..=self.config.health_retries {
            if !exit_reported && let Ok(Some(status)) = child.try_wait() {
                warn!("Backend for {} exited early with {}", instance_id, status);
                exit_reported = true;
            }
            if client.health().await.is_ok() {
                return Ok(());
            }
            trace!(
                "{} not healthy yet ({}/{})",
                instance_id, attempt, self.config.health_retries
            );
            tokio::time::sleep(self.config.health_interval).await;
        }
        Err(LaunchError::LaunchTimeout {
            instance_id: instance_id.clone(),
            attempts: self.config.health_retries,
        })
    }

    fn track(&self, instance_id: InstanceId, child: Child) {
        let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.push(SpawnedChild { instance_id, child });
    }

    /// Ids of instances this launcher spawned, in spawn order.
    pub fn spawned(&self) -> Vec<InstanceId> {
        let children = self.children.lock().unwrap_or_else(|e| e.into_inner());
        children.iter().map(|c| c.instance_id.clone()).collect()
    }

    /// Terminate every spawned child and wait for it to exit.
    pub async fn shutdown(&self) {
        let children: Vec<SpawnedChild> = {
            let mut children = self.children.lock().unwrap_or_else(|e| e.into_inner());
            children.drain(..).collect()
        };

        for SpawnedChild {
            instance_id,
            mut child,
        } in children
        {
            if let Err(e) = child.start_kill() {
                debug!("Backend for {} already gone: {}", instance_id, e);
                continue;
            }
            match tokio::time::timeout(CHILD_EXIT_TIMEOUT, child.wait()).await {
                Ok(Ok(status)) => info!("Stopped backend for {} ({})", instance_id, status),
                Ok(Err(e)) => warn!("Failed to reap backend for {}: {}", instance_id, e),
                Err(_) => warn!("Backend for {} did not exit in time", instance_id),
            }
        }
    }
}

async fn log_output<R>(instance_id: InstanceId, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!("[{} {}] {}", instance_id, stream, line);
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::opencode::EventStreamConfig;
    use crate::process::discovery::LaunchSignature;
    use crate::process::discovery::tests::FakeEnumerator;
    use async_trait::async_trait;
    use herd_application::{BackendSession, InstanceRegistry, ProviderInfo};
    use herd_domain::ProjectPolicy;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ==================== Test Mocks ====================

    struct FixedHealthClient {
        base_url: String,
        directory: PathBuf,
        healthy: bool,
    }

    #[async_trait]
    impl BackendClient for FixedHealthClient {
        fn base_url(&self) -> &str {
            &self.base_url
        }

        fn directory(&self) -> &Path {
            &self.directory
        }

        async fn health(&self) -> Result<(), BackendError> {
            if self.healthy {
                Ok(())
            } else {
                Err(BackendError::Transport("connection refused".to_string()))
            }
        }

        async fn list_sessions(&self) -> Result<Vec<BackendSession>, BackendError> {
            Ok(vec![])
        }

        async fn create_session(
            &self,
            _title: Option<&str>,
        ) -> Result<BackendSession, BackendError> {
            Err(BackendError::Transport("unused".to_string()))
        }

        async fn get_session(&self, _session_id: &str) -> Result<BackendSession, BackendError> {
            Err(BackendError::Transport("unused".to_string()))
        }

        async fn delete_session(&self, _session_id: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn send_prompt(&self, _session_id: &str, _text: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn messages(&self, _session_id: &str) -> Result<Vec<serde_json::Value>, BackendError> {
            Ok(vec![])
        }

        async fn abort(&self, _session_id: &str) -> Result<(), BackendError> {
            Ok(())
        }

        async fn providers(&self) -> Result<Vec<ProviderInfo>, BackendError> {
            Ok(vec![])
        }

        async fn select_model(&self, _provider_id: &str, _model_id: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }

    struct FixedHealthConnector {
        healthy: bool,
        connects: AtomicUsize,
    }

    impl BackendConnector for FixedHealthConnector {
        fn connect(
            &self,
            base_url: &str,
            directory: &Path,
        ) -> Result<Arc<dyn BackendClient>, BackendError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FixedHealthClient {
                base_url: base_url.to_string(),
                directory: directory.to_path_buf(),
                healthy: self.healthy,
            }))
        }
    }

    // ==================== Helpers ====================

    struct Fixture {
        launcher: InstanceLauncher,
        registry: Arc<InstanceRegistry>,
        root: tempfile::TempDir,
    }

    fn fixture(healthy: bool) -> Fixture {
        fixture_in(tempfile::tempdir().unwrap(), healthy, FakeEnumerator::new(&[]))
    }

    fn fixture_in(root: tempfile::TempDir, healthy: bool, processes: FakeEnumerator) -> Fixture {
        let registry = Arc::new(InstanceRegistry::new());
        let connector = Arc::new(FixedHealthConnector {
            healthy,
            connects: AtomicUsize::new(0),
        });
        let discoverer = Arc::new(ProcessDiscoverer::new(
            Arc::new(processes),
            connector.clone(),
            LaunchSignature::default(),
        ));
        let supervisor = Arc::new(Supervisor::new(
            registry.clone(),
            None,
            EventStreamConfig::default(),
        ));
        // `sh -c 'sleep 30' opencode --hostname .. --port ..` stands in for
        // the backend; the extra arguments become positional parameters.
        let config = LauncherConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string(), "opencode".to_string()],
            hostname: "127.0.0.1".to_string(),
            launch_base_port: 43100,
            port_probe_attempts: 50,
            health_interval: Duration::from_millis(10),
            health_retries: 3,
        };
        let launcher = InstanceLauncher::new(
            config,
            PathGuard::new(ProjectPolicy::new(vec![root.path().to_path_buf()], false)),
            discoverer,
            connector,
            supervisor,
        );
        Fixture {
            launcher,
            registry,
            root,
        }
    }

    fn project(root: &Path, name: &str) -> PathBuf {
        let dir = root.join(name);
        std::fs::create_dir_all(dir.join(".git")).unwrap();
        dir
    }

    // ==================== Tests ====================

    #[tokio::test]
    async fn test_launch_is_idempotent() {
        let f = fixture(true);
        let dir = project(f.root.path(), "app");

        let first = f.launcher.launch(&dir).await.unwrap();
        let second = f.launcher.launch(&dir).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.id.as_str(), "auto-app");
        assert_eq!(first.origin, InstanceOrigin::Launched);
        assert_eq!(f.launcher.spawned().len(), 1);
        assert_eq!(f.registry.len(), 1);

        f.launcher.shutdown().await;
        assert!(f.launcher.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_launch_timeout_keeps_child_tracked() {
        let f = fixture(false);
        let dir = project(f.root.path(), "slow");

        let err = f.launcher.launch(&dir).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::LaunchTimeout { attempts: 3, .. }
        ));
        assert_eq!(f.launcher.spawned().len(), 1);
        assert!(f.registry.is_empty());

        f.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_directory_spawns_nothing() {
        let f = fixture(true);
        let unmarked = f.root.path().join("empty");
        std::fs::create_dir(&unmarked).unwrap();

        let err = f.launcher.launch(&unmarked).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::PathValidation(PathValidationError::NoProjectMarker(_))
        ));
        assert!(f.launcher.spawned().is_empty());
    }

    #[tokio::test]
    async fn test_leaf_name_collision_is_reported() {
        let f = fixture(true);
        let first = project(&f.root.path().join("a"), "app");
        let second = project(&f.root.path().join("b"), "app");

        f.launcher.launch(&first).await.unwrap();
        let err = f.launcher.launch(&second).await.unwrap_err();
        assert!(matches!(err, LaunchError::IdCollision { .. }));
        assert_eq!(f.launcher.spawned().len(), 1);

        f.launcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_command() {
        let mut f = fixture(true);
        f.launcher.config.command = "definitely-not-a-backend-binary".to_string();
        let dir = project(f.root.path(), "app");

        let err = f.launcher.launch(&dir).await.unwrap_err();
        assert!(matches!(err, LaunchError::CommandNotFound(_)));
    }

    #[tokio::test]
    async fn test_running_backend_is_adopted_not_spawned() {
        let root = tempfile::tempdir().unwrap();
        let dir = project(root.path(), "app");
        let processes = FakeEnumerator::new(&[(
            77,
            &["opencode", "serve", "--port", "4321"],
            Some(dir.as_path()),
        )]);
        let f = fixture_in(root, true, processes);

        let instance = f.launcher.launch(&dir).await.unwrap();

        assert_eq!(instance.origin, InstanceOrigin::Discovered);
        assert_eq!(instance.base_url, "http://127.0.0.1:4321");
        assert!(f.launcher.spawned().is_empty());
        assert!(f.registry.contains(&instance.id));

        let again = f.launcher.launch(&dir).await.unwrap();
        assert_eq!(again, instance);
        assert!(f.launcher.spawned().is_empty());
    }
}
