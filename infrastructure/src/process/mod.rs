//! Local backend processes: discovery, port allocation and launching.
//!
//! - [`enumerator`]: listing processes and their working directories
//! - [`discovery`]: recognising running backends ([`ProcessDiscoverer`])
//! - [`path_guard`]: where a backend may be launched
//! - [`port`]: free-port search
//! - [`launcher`]: spawning and owning backends ([`InstanceLauncher`])

pub mod discovery;
pub mod enumerator;
pub mod launcher;
pub mod path_guard;
pub mod port;

pub use discovery::{LaunchSignature, ProcessDiscoverer};
pub use enumerator::{DiscoveryError, ProcessEnumerator, ProcessInfo, SystemProcessEnumerator};
pub use launcher::{InstanceLauncher, LaunchError, LauncherConfig};
pub use path_guard::PathGuard;
pub use port::{NoPortAvailable, find_available_port};
