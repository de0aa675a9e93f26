//! Infrastructure layer for herd
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the OpenCode HTTP client and event stream,
//! local process discovery and launching, configuration loading and
//! the event journal.

pub mod config;
pub mod logging;
pub mod opencode;
pub mod process;
pub mod supervisor;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileBackendConfig, FileCleanupConfig, FileConfig,
    FileDeliveryConfig, FileInstanceConfig, FileLoggingConfig, FileProjectsConfig,
    FileStreamConfig,
};
pub use logging::JsonlEventJournal;
pub use opencode::{
    EventStreamClient, EventStreamConfig, OpenCodeClient, OpenCodeConnector, StreamError,
};
pub use process::{
    DiscoveryError, InstanceLauncher, LaunchError, LaunchSignature, LauncherConfig, PathGuard,
    ProcessDiscoverer, SystemProcessEnumerator,
};
pub use supervisor::Supervisor;
