use super::table::MountTable;
use crate::error::Result;
use crate::platform::{Platform, PlatformInfo};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::executor::SystemBackend;

/// The mount operations the convergence engine needs from the system.
/// One real implementation drives external commands; tests substitute
/// an in-memory one.
#[async_trait]
pub trait MountBackend: Send + Sync {
    /// Snapshot the current mount table
    async fn read_table(&self) -> Result<MountTable>;

    /// Mount `sources` at `target`: a bind mount for a single source, a
    /// mergerfs union for several. An empty source set is a no-op.
    async fn mount(&self, sources: &[PathBuf], target: &Path) -> Result<()>;

    /// Issue a single unmount call for `target`. Stacked mounts need one
    /// call per layer; the engine re-reads the table and repeats.
    async fn unmount(&self, target: &Path) -> Result<()>;

    /// Render the mount command for logging
    fn mount_command(&self, sources: &[PathBuf], target: &Path) -> String;
}

/// Factory for the platform mount backend
pub fn get_mount_backend(platform_info: &PlatformInfo) -> Result<Box<dyn MountBackend>> {
    match &platform_info.platform {
        Platform::Linux(info) => {
            let missing = platform_info.missing_tools();
            if let Some(tool) = missing.first() {
                return Err(crate::error::UnionwatchError::ToolNotFound {
                    tool: (*tool).to_string(),
                });
            }
            if !info.fuse_available {
                return Err(crate::error::UnionwatchError::PlatformNotSupported {
                    platform: "Linux without FUSE support".to_string(),
                });
            }
            Ok(Box::new(SystemBackend::new(info)))
        }
        Platform::Unsupported(os) => Err(crate::error::UnionwatchError::PlatformNotSupported {
            platform: os.clone(),
        }),
    }
}
