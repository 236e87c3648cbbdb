use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

use super::backend::MountBackend;
use super::table::MountTable;
use crate::error::{Result, UnionwatchError};
use crate::platform::LinuxInfo;
use crate::platform::common::{MOUNT_POINT_PERMISSIONS, MOUNT_TIMEOUT, UNMOUNT_TIMEOUT};
use crate::platform::linux::{
    DEFAULT_UNION_OPTIONS, MERGERFS_BIN, MOUNT_BIN, PROC_MOUNTINFO, UMOUNT_BIN,
};

/// Mount backend that drives the real mount, umount and mergerfs
/// binaries and reads /proc/self/mountinfo.
pub struct SystemBackend {
    mount_path: PathBuf,
    umount_path: PathBuf,
    mergerfs_path: PathBuf,
}

impl SystemBackend {
    pub fn new(info: &LinuxInfo) -> Self {
        // The backend factory already verified these tools exist; the
        // bare names keep PATH lookup as a fallback.
        Self {
            mount_path: info
                .mount_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(MOUNT_BIN)),
            umount_path: info
                .umount_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(UMOUNT_BIN)),
            mergerfs_path: info
                .mergerfs_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(MERGERFS_BIN)),
        }
    }

    /// Pick the invocation for this source set: `mount --bind` for one
    /// source, mergerfs for several. The mergerfs fsname is pinned to
    /// the colon-joined branch list so the next pass can read the
    /// mounted sources straight out of the mount table.
    fn mount_invocation(&self, sources: &[PathBuf], target: &Path) -> (PathBuf, Vec<String>) {
        if let [source] = sources {
            (
                self.mount_path.clone(),
                vec![
                    "--bind".to_string(),
                    source.display().to_string(),
                    target.display().to_string(),
                ],
            )
        } else {
            let branches = sources
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(":");

            let mut opts: Vec<String> =
                DEFAULT_UNION_OPTIONS.iter().map(|s| s.to_string()).collect();
            opts.push(format!("fsname={branches}"));

            (
                self.mergerfs_path.clone(),
                vec![
                    "-o".to_string(),
                    opts.join(","),
                    branches,
                    target.display().to_string(),
                ],
            )
        }
    }
}

#[async_trait]
impl MountBackend for SystemBackend {
    async fn read_table(&self) -> Result<MountTable> {
        let content = tokio::fs::read_to_string(PROC_MOUNTINFO)
            .await
            .map_err(|error| UnionwatchError::MountTableUnreadable {
                path: PathBuf::from(PROC_MOUNTINFO),
                error,
            })?;
        Ok(MountTable::parse(&content))
    }

    async fn mount(&self, sources: &[PathBuf], target: &Path) -> Result<()> {
        if sources.is_empty() {
            debug!("No sources for {}, nothing to mount", target.display());
            return Ok(());
        }

        ensure_mount_point(target).await?;

        let (program, args) = self.mount_invocation(sources, target);
        info!(
            "Mounting {} source(s) at {}",
            sources.len(),
            target.display()
        );

        let output = run_command(&program, &args, MOUNT_TIMEOUT).await?;
        if !output.status.success() {
            return Err(UnionwatchError::MountFailed {
                target: target.to_path_buf(),
                command: render_command(&program, &args),
                detail: command_failure_detail(&output),
            });
        }

        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        info!("Unmounting {}", target.display());

        let args = vec![target.display().to_string()];
        let output = run_command(&self.umount_path, &args, UNMOUNT_TIMEOUT).await?;
        if !output.status.success() {
            return Err(UnionwatchError::UnmountFailed {
                target: target.to_path_buf(),
                command: render_command(&self.umount_path, &args),
                detail: command_failure_detail(&output),
            });
        }

        Ok(())
    }

    fn mount_command(&self, sources: &[PathBuf], target: &Path) -> String {
        let (program, args) = self.mount_invocation(sources, target);
        render_command(&program, &args)
    }
}

async fn run_command(
    program: &Path,
    args: &[String],
    limit: Duration,
) -> Result<std::process::Output> {
    debug!("Running: {}", render_command(program, args));

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args).kill_on_drop(true);

    timeout(limit, cmd.output())
        .await
        .map_err(|_| UnionwatchError::CommandTimeout {
            command: render_command(program, args),
            timeout_secs: limit.as_secs(),
        })?
        .map_err(UnionwatchError::from)
}

fn render_command(program: &Path, args: &[String]) -> String {
    format!("{} {}", program.display(), args.join(" "))
}

fn command_failure_detail(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_string()
    }
}

/// Ensure the mount point directory exists with standard permissions
async fn ensure_mount_point(path: &Path) -> Result<()> {
    if !path.exists() {
        debug!("Creating mount point directory: {}", path.display());
        tokio::fs::create_dir_all(path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(MOUNT_POINT_PERMISSIONS);
            tokio::fs::set_permissions(path, permissions).await?;
        }
    } else if !path.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            format!("{} exists but is not a directory", path.display()),
        )
        .into());
    }

    Ok(())
}
