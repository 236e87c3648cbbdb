use crate::error::{Result, UnionwatchError};
use crate::platform::common::EVENT_WAIT_TIMEOUT;
use crate::platform::linux::{INOTIFYWAIT_BIN, WATCH_EVENTS, WATCH_ROOTS};
use crate::platform::{Platform, PlatformInfo};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Why a wait between passes ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// A filesystem event fired under one of the watch roots
    Event,
    /// Nothing happened before the timeout
    TimedOut,
}

/// Waits between reconciliation passes by running inotifywait against
/// the directories removable media shows up under. Watching is an
/// optimization only; the timeout guarantees a pass happens even when
/// events are missed or the watcher cannot run at all.
pub struct MountWatcher {
    inotifywait_path: PathBuf,
    roots: Vec<PathBuf>,
    timeout: Duration,
}

impl MountWatcher {
    pub fn new(platform_info: &PlatformInfo) -> Result<Self> {
        match &platform_info.platform {
            Platform::Linux(info) => {
                let inotifywait_path =
                    info.inotifywait_path
                        .clone()
                        .ok_or_else(|| UnionwatchError::ToolNotFound {
                            tool: INOTIFYWAIT_BIN.to_string(),
                        })?;
                Ok(Self::with_roots(
                    inotifywait_path,
                    WATCH_ROOTS.iter().map(PathBuf::from).collect(),
                    EVENT_WAIT_TIMEOUT,
                ))
            }
            Platform::Unsupported(os) => Err(UnionwatchError::PlatformNotSupported {
                platform: os.clone(),
            }),
        }
    }

    pub fn with_roots(inotifywait_path: PathBuf, roots: Vec<PathBuf>, timeout: Duration) -> Self {
        Self {
            inotifywait_path,
            roots,
            timeout,
        }
    }

    /// Wait for the next filesystem event under the watch roots, or for
    /// the timeout, whichever comes first.
    pub async fn wait(&self) -> WatchOutcome {
        let roots = self.existing_roots();
        if roots.is_empty() {
            debug!(
                "No watch roots exist, waiting {}s",
                self.timeout.as_secs()
            );
            sleep(self.timeout).await;
            return WatchOutcome::TimedOut;
        }

        let mut cmd = tokio::process::Command::new(&self.inotifywait_path);
        cmd.args(self.build_args(&roots))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match cmd.status().await {
            // inotifywait exits 0 on an event and 2 on timeout
            Ok(status) if status.code() == Some(0) => WatchOutcome::Event,
            Ok(status) if status.code() == Some(2) => WatchOutcome::TimedOut,
            Ok(status) => {
                warn!("inotifywait exited with {status}, falling back to a timer");
                sleep(self.timeout).await;
                WatchOutcome::TimedOut
            }
            Err(e) => {
                warn!("Failed to run inotifywait: {e}, falling back to a timer");
                sleep(self.timeout).await;
                WatchOutcome::TimedOut
            }
        }
    }

    /// Roots that exist right now. Watching a missing directory would
    /// make inotifywait exit immediately with an error.
    fn existing_roots(&self) -> Vec<&Path> {
        self.roots
            .iter()
            .filter(|r| r.is_dir())
            .map(PathBuf::as_path)
            .collect()
    }

    fn build_args(&self, roots: &[&Path]) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-q".to_string(),
            "-t".to_string(),
            self.timeout.as_secs().max(1).to_string(),
        ];
        for event in WATCH_EVENTS {
            args.push("-e".to_string());
            args.push((*event).to_string());
        }
        for root in roots {
            args.push(root.display().to_string());
        }
        args
    }
}
