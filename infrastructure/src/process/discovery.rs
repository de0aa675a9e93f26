//! Discovery of backend instances already running on this host.
//!
//! Each call is a fresh snapshot of the process table; callers re-invoke it
//! rather than caching the result.

use super::enumerator::{DiscoveryError, ProcessEnumerator, ProcessInfo};
use herd_application::BackendConnector;
use herd_domain::{Instance, InstanceOrigin};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Host discovered instances are reached through.
const LOOPBACK: &str = "127.0.0.1";

/// How to recognise a backend server in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSignature {
    /// File name of the backend executable.
    pub executable: String,
    /// Subcommand that starts the server.
    pub subcommand: String,
    /// Port assumed when the command line names none.
    pub default_port: u16,
}

impl Default for LaunchSignature {
    fn default() -> Self {
        Self {
            executable: "opencode".to_string(),
            subcommand: "serve".to_string(),
            default_port: 4096,
        }
    }
}

impl LaunchSignature {
    /// Build from the configured command, which may be a path.
    pub fn for_command(command: &str, subcommand: &str, default_port: u16) -> Self {
        let executable = Path::new(command)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| command.to_string());
        Self {
            executable,
            subcommand: subcommand.to_string(),
            default_port,
        }
    }

    /// The executable appears in argv (directly or behind an interpreter)
    /// and the server subcommand follows it.
    pub fn matches(&self, args: &[String]) -> bool {
        args.iter()
            .position(|arg| {
                Path::new(arg)
                    .file_name()
                    .is_some_and(|name| name == self.executable.as_str())
            })
            .is_some_and(|i| args[i + 1..].iter().any(|arg| *arg == self.subcommand))
    }

    /// `--port N` or `--port=N`; the default port when absent.
    pub fn port(&self, args: &[String]) -> u16 {
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if arg == "--port" {
                if let Some(port) = iter.next().and_then(|v| v.parse().ok()) {
                    return port;
                }
            } else if let Some(value) = arg.strip_prefix("--port=")
                && let Ok(port) = value.parse()
            {
                return port;
            }
        }
        self.default_port
    }
}

pub struct ProcessDiscoverer {
    enumerator: Arc<dyn ProcessEnumerator>,
    connector: Arc<dyn BackendConnector>,
    signature: LaunchSignature,
}

impl ProcessDiscoverer {
    pub fn new(
        enumerator: Arc<dyn ProcessEnumerator>,
        connector: Arc<dyn BackendConnector>,
        signature: LaunchSignature,
    ) -> Self {
        Self {
            enumerator,
            connector,
            signature,
        }
    }

    /// Every process matching the launch signature, as an instance.
    ///
    /// Not deduplicated: two servers may share a directory or a leaf name.
    async fn matching_processes(&self) -> Result<Vec<(u32, Instance)>, DiscoveryError> {
        let mut matches = Vec::new();
        for ProcessInfo { pid, args, cwd } in self.enumerator.processes().await? {
            if !self.signature.matches(&args) {
                continue;
            }
            let Some(cwd) = cwd else {
                warn!("Skipping backend pid {}: working directory unknown", pid);
                continue;
            };

            let port = self.signature.port(&args);
            debug!("Found backend pid {} on port {} in {}", pid, port, cwd.display());
            matches.push((
                pid,
                Instance::derived(
                    Instance::local_url(LOOPBACK, port),
                    cwd,
                    InstanceOrigin::Discovered,
                ),
            ));
        }
        Ok(matches)
    }

    /// Every running backend whose working directory can be resolved.
    ///
    /// Two servers whose directories share a leaf name share a derived id;
    /// the first one listed wins.
    pub async fn discover_running_instances(&self) -> Result<Vec<Instance>, DiscoveryError> {
        let mut seen = HashSet::new();
        let mut instances = Vec::new();

        for (pid, instance) in self.matching_processes().await? {
            if !seen.insert(instance.id.clone()) {
                warn!(
                    "Ignoring backend pid {} at {}: {} is already taken",
                    pid, instance.base_url, instance.id
                );
                continue;
            }
            instances.push(instance);
        }

        info!("Discovered {} running backend instance(s)", instances.len());
        Ok(instances)
    }

    /// The running, healthy instance serving `path`, if any.
    ///
    /// Every process in that directory is tried in turn; one that fails its
    /// health probe is treated as stale.
    pub async fn find_existing_instance_for_path(
        &self,
        path: &Path,
    ) -> Result<Option<Instance>, DiscoveryError> {
        let Ok(target) = tokio::fs::canonicalize(path).await else {
            return Ok(None);
        };

        for (pid, instance) in self.matching_processes().await? {
            let cwd = tokio::fs::canonicalize(&instance.working_directory)
                .await
                .unwrap_or_else(|_| instance.working_directory.clone());
            if cwd != target {
                continue;
            }

            if self.is_healthy(&instance).await {
                return Ok(Some(instance));
            }
            warn!(
                "Backend pid {} for {} at {} fails its health probe; treating it as stale",
                pid,
                target.display(),
                instance.base_url
            );
        }
        Ok(None)
    }

    /// Run the health probe against an instance.
    pub async fn is_healthy(&self, instance: &Instance) -> bool {
        match self
            .connector
            .connect(&instance.base_url, &instance.working_directory)
        {
            Ok(client) => client.health().await.is_ok(),
            Err(e) => {
                debug!("Cannot build client for {}: {}", instance.base_url, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::opencode::OpenCodeConnector;
    use async_trait::async_trait;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // ==================== Test Mocks ====================

    pub(crate) struct FakeEnumerator {
        processes: Vec<ProcessInfo>,
    }

    impl FakeEnumerator {
        pub(crate) fn new(entries: &[(u32, &[&str], Option<&Path>)]) -> Self {
            let processes = entries
                .iter()
                .map(|(pid, args, cwd)| ProcessInfo {
                    pid: *pid,
                    args: args.iter().map(|a| a.to_string()).collect(),
                    cwd: cwd.map(Path::to_path_buf),
                })
                .collect();
            Self { processes }
        }
    }

    #[async_trait]
    impl ProcessEnumerator for FakeEnumerator {
        async fn processes(&self) -> Result<Vec<ProcessInfo>, DiscoveryError> {
            Ok(self.processes.clone())
        }
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn discoverer(enumerator: FakeEnumerator) -> ProcessDiscoverer {
        ProcessDiscoverer::new(
            Arc::new(enumerator),
            Arc::new(OpenCodeConnector::new(Duration::from_secs(2))),
            LaunchSignature::default(),
        )
    }

    // ==================== Signature ====================

    #[test]
    fn test_signature_matches_direct_and_interpreted() {
        let sig = LaunchSignature::default();
        assert!(sig.matches(&args(&["opencode", "serve"])));
        assert!(sig.matches(&args(&["/usr/local/bin/opencode", "serve", "--port", "4100"])));
        assert!(sig.matches(&args(&["node", "/opt/lib/opencode", "serve"])));
        assert!(!sig.matches(&args(&["opencode", "run", "hello"])));
        assert!(!sig.matches(&args(&["vim", "opencode.json"])));
        assert!(!sig.matches(&args(&["serve", "opencode"])));
    }

    #[test]
    fn test_signature_port() {
        let sig = LaunchSignature::default();
        assert_eq!(sig.port(&args(&["opencode", "serve", "--port", "4101"])), 4101);
        assert_eq!(sig.port(&args(&["opencode", "serve", "--port=4102"])), 4102);
        assert_eq!(sig.port(&args(&["opencode", "serve"])), 4096);
        assert_eq!(sig.port(&args(&["opencode", "serve", "--port", "x"])), 4096);
    }

    #[test]
    fn test_signature_from_command_path() {
        let sig = LaunchSignature::for_command("/opt/oc/bin/opencode", "serve", 4096);
        assert_eq!(sig.executable, "opencode");
    }

    // ==================== Discovery ====================

    #[tokio::test]
    async fn test_discover_skips_unresolvable_cwd() {
        let enumerator = FakeEnumerator::new(&[
            (10, &["opencode", "serve", "--port", "4100"], Some(Path::new("/home/dev/app"))),
            (11, &["opencode", "serve", "--port", "4101"], None),
            (12, &["bash"], Some(Path::new("/home/dev"))),
        ]);
        let instances = discoverer(enumerator).discover_running_instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id.as_str(), "auto-app");
        assert_eq!(instances[0].base_url, "http://127.0.0.1:4100");
        assert_eq!(instances[0].origin, InstanceOrigin::Discovered);
    }

    #[tokio::test]
    async fn test_discover_keeps_first_of_duplicate_ids() {
        let enumerator = FakeEnumerator::new(&[
            (10, &["opencode", "serve", "--port", "4100"], Some(Path::new("/home/a/app"))),
            (11, &["opencode", "serve", "--port", "4101"], Some(Path::new("/home/b/app"))),
        ]);
        let instances = discoverer(enumerator).discover_running_instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].base_url, "http://127.0.0.1:4100");
    }

    #[tokio::test]
    async fn test_find_existing_requires_healthy_backend() {
        let project = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let port = server.address().port().to_string();
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let enumerator = FakeEnumerator::new(&[(
            10,
            &["opencode", "serve", "--port", port.as_str()],
            Some(project.path()),
        )]);
        let found = discoverer(enumerator)
            .find_existing_instance_for_path(project.path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.base_url, server.uri());
    }

    #[tokio::test]
    async fn test_find_existing_ignores_unhealthy_process() {
        let project = tempfile::tempdir().unwrap();
        let server = MockServer::start().await;
        let port = server.address().port().to_string();
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let enumerator = FakeEnumerator::new(&[(
            10,
            &["opencode", "serve", "--port", port.as_str()],
            Some(project.path()),
        )]);
        let found = discoverer(enumerator)
            .find_existing_instance_for_path(project.path())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_existing_other_directory() {
        let project = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let enumerator = FakeEnumerator::new(&[(
            10,
            &["opencode", "serve"],
            Some(other.path()),
        )]);
        let found = discoverer(enumerator)
            .find_existing_instance_for_path(project.path())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    async fn healthy_backend() -> (MockServer, String) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        let port = server.address().port().to_string();
        (server, port)
    }

    #[tokio::test]
    async fn test_find_existing_skips_stale_process_in_same_directory() {
        let project = tempfile::tempdir().unwrap();
        let (server, port) = healthy_backend().await;
        let dead_port = crate::process::port::find_available_port("127.0.0.1", 45200, 100)
            .await
            .unwrap()
            .to_string();

        let enumerator = FakeEnumerator::new(&[
            (10, &["opencode", "serve", "--port", dead_port.as_str()], Some(project.path())),
            (11, &["opencode", "serve", "--port", port.as_str()], Some(project.path())),
        ]);
        let found = discoverer(enumerator)
            .find_existing_instance_for_path(project.path())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.base_url, server.uri());
    }

    #[tokio::test]
    async fn test_find_existing_ignores_leaf_name_twin() {
        let root = tempfile::tempdir().unwrap();
        let twin = root.path().join("a").join("app");
        let project = root.path().join("b").join("app");
        std::fs::create_dir_all(&twin).unwrap();
        std::fs::create_dir_all(&project).unwrap();
        let (server, port) = healthy_backend().await;

        let enumerator = FakeEnumerator::new(&[
            (10, &["opencode", "serve", "--port", "1"], Some(twin.as_path())),
            (11, &["opencode", "serve", "--port", port.as_str()], Some(project.as_path())),
        ]);
        let found = discoverer(enumerator)
            .find_existing_instance_for_path(&project)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.base_url, server.uri());
        assert_eq!(found.id.as_str(), "auto-app");
    }
}
