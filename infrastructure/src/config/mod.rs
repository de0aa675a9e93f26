//! Configuration file loading for herd
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `HERD_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./herd.toml` or `./.herd.toml`
//! 4. XDG config: `$XDG_CONFIG_HOME/herd/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileBackendConfig, FileCleanupConfig, FileConfig, FileDeliveryConfig,
    FileInstanceConfig, FileLoggingConfig, FileProjectsConfig, FileStreamConfig,
};
pub use loader::{ALLOWED_ROOTS_VAR, ConfigLoader, UNRESTRICTED_VAR};
