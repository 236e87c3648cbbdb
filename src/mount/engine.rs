use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::backend::MountBackend;
use super::resolver::resolve_sources;
use super::table::MountTable;
use super::types::{Action, MountOutcome, MountState, PassReport};
use crate::config::MountSpec;
use crate::error::{Result, UnionwatchError};
use crate::platform::common::MAX_UNMOUNT_DRAIN;

/// Reconciles configured mounts against the mount table. The engine
/// holds no state of its own; every pass starts from a fresh table
/// snapshot, which is what makes crash recovery and manual meddling
/// self-correct.
pub struct ConvergenceEngine<'a> {
    backend: &'a dyn MountBackend,
}

/// Classify one mount point. `mounted` is the source set of the topmost
/// mount, or `None` when nothing is mounted; `stacked` is true when more
/// than one mount is layered at the mount point; `effective` is the
/// configured sources that exist right now, in configuration order. A
/// matching top layer on a stack still reads as stale, so the layers
/// hidden underneath get drained.
pub fn decide(
    mounted: Option<&[PathBuf]>,
    stacked: bool,
    effective: &[PathBuf],
) -> (MountState, Action) {
    match mounted {
        None if effective.is_empty() => (MountState::Absent, Action::NoOp),
        None => (
            MountState::Absent,
            Action::Mount {
                sources: effective.to_vec(),
            },
        ),
        Some(current) if current == effective && !stacked => {
            (MountState::MountedCorrect, Action::NoOp)
        }
        Some(_) if effective.is_empty() => (MountState::MountedStale, Action::Unmount),
        Some(_) => (
            MountState::MountedStale,
            Action::Remount {
                sources: effective.to_vec(),
            },
        ),
    }
}

impl<'a> ConvergenceEngine<'a> {
    pub fn new(backend: &'a dyn MountBackend) -> Self {
        Self { backend }
    }

    /// Run one reconciliation pass over every configured mount point.
    /// A failing mount point is recorded and the pass moves on, unless
    /// `fail_fast` asks to stop at the first failure. Only an unreadable
    /// mount table fails the pass as a whole.
    pub async fn run_pass(&self, specs: &[MountSpec], fail_fast: bool) -> Result<PassReport> {
        let table = self.backend.read_table().await?;
        let mut report = PassReport::default();

        for spec in specs {
            let outcome = self.converge(spec, &table).await;
            let failed = !outcome.succeeded();
            report.outcomes.push(outcome);
            if failed && fail_fast {
                break;
            }
        }

        Ok(report)
    }

    async fn converge(&self, spec: &MountSpec, table: &MountTable) -> MountOutcome {
        let target = &spec.mount_point;
        let effective = resolve_sources(&spec.sources);
        let depth = table.mount_count(target);
        let mounted = (depth > 0).then(|| table.mounted_sources(target));

        let (state, action) = decide(mounted.as_deref(), depth > 1, &effective);

        match &action {
            Action::NoOp => match state {
                MountState::MountedCorrect => debug!(
                    "{}: already mounted with {} source(s)",
                    target.display(),
                    effective.len()
                ),
                _ => debug!("{}: no sources available, leaving unmounted", target.display()),
            },
            Action::Mount { sources } => info!(
                "{}: mounting ({})",
                target.display(),
                self.backend.mount_command(sources, target)
            ),
            Action::Unmount => info!("{}: no sources remain, unmounting", target.display()),
            Action::Remount { sources } if mounted.as_deref() == Some(sources.as_slice()) => {
                info!(
                    "{}: {} mounts stacked on the same point, remounting clean",
                    target.display(),
                    depth
                )
            }
            Action::Remount { sources } => info!(
                "{}: sources changed ({} -> {}), remounting",
                target.display(),
                join_paths(mounted.as_deref().unwrap_or_default()),
                join_paths(sources)
            ),
        }

        let result = self.apply(&action, target).await;
        if let Err(e) = &result {
            warn!("{}: {} failed: {}", target.display(), action.name(), e);
        }

        MountOutcome {
            mount_point: target.clone(),
            state,
            action,
            result,
        }
    }

    async fn apply(&self, action: &Action, target: &Path) -> Result<()> {
        match action {
            Action::NoOp => Ok(()),
            Action::Mount { sources } => self.backend.mount(sources, target).await,
            Action::Unmount => self.drain(target).await,
            Action::Remount { sources } => {
                self.drain(target).await?;
                self.backend.mount(sources, target).await
            }
        }
    }

    /// Unmount until nothing is left at the mount point. Mounts stack,
    /// so one call can uncover an older mount underneath; the pass must
    /// not end with a stale mount freshly exposed.
    async fn drain(&self, target: &Path) -> Result<()> {
        for _ in 0..MAX_UNMOUNT_DRAIN {
            self.backend.unmount(target).await?;
            let table = self.backend.read_table().await?;
            if !table.is_mounted(target) {
                return Ok(());
            }
            debug!(
                "{}: another mount is stacked underneath, unmounting again",
                target.display()
            );
        }

        Err(UnionwatchError::UnmountFailed {
            target: target.to_path_buf(),
            command: "umount".to_string(),
            detail: format!("mount stack did not drain after {MAX_UNMOUNT_DRAIN} unmount calls"),
        })
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
