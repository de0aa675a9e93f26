//! Backend process configuration from TOML (`[backend]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How backend instances are launched, probed and talked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Executable name or path of the backend server
    pub command: String,
    /// Arguments placed before `--hostname`/`--port`
    pub args: Vec<String>,
    /// Interface launched instances bind to
    pub hostname: String,
    /// Port a discovered process listens on when its command line names none
    pub default_port: u16,
    /// First port probed for launched instances; above the range used by
    /// pre-configured instances
    pub launch_base_port: u16,
    /// Consecutive ports probed before giving up
    pub port_probe_attempts: u16,
    /// Delay between health probes while waiting for a launch
    pub health_interval_ms: u64,
    /// Health probes before a launch times out
    pub health_retries: u32,
    /// Timeout of one backend API request
    pub request_timeout_secs: u64,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            command: "opencode".to_string(),
            args: vec!["serve".to_string()],
            hostname: "127.0.0.1".to_string(),
            default_port: 4096,
            launch_base_port: 4100,
            port_probe_attempts: 50,
            health_interval_ms: 500,
            health_retries: 40,
            request_timeout_secs: 30,
        }
    }
}

impl FileBackendConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_millis(self.health_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_partial_override() {
        let toml_str = r#"
[backend]
command = "/opt/opencode/bin/opencode"
launch_base_port = 5000
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.command, "/opt/opencode/bin/opencode");
        assert_eq!(config.backend.launch_base_port, 5000);
        assert_eq!(config.backend.args, vec!["serve".to_string()]);
        assert_eq!(config.backend.health_interval(), Duration::from_millis(500));
    }
}
