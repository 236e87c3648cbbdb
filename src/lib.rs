pub mod config;
pub mod daemon;
pub mod error;
pub mod mount;
pub mod platform;
pub mod watch;

pub use config::{ConfigFile, MountSpec, default_config_path};
pub use daemon::{Daemon, Shutdown};
pub use error::{Result, UnionwatchError};
#[cfg(test)]
pub use mount::MockBackend;
pub use mount::{ConvergenceEngine, MountBackend, MountTable, get_mount_backend};
pub use platform::{Platform, PlatformInfo, detect_platform};
pub use watch::MountWatcher;
