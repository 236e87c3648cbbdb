use crate::error::Result;
use std::path::PathBuf;

/// Where one mount point stands relative to its desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    /// Nothing is mounted at the mount point
    Absent,

    /// Mounted with exactly the effective source set
    MountedCorrect,

    /// Mounted, but with sources that differ from the effective set
    MountedStale,
}

/// What the engine decided to do about one mount point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NoOp,
    Mount { sources: Vec<PathBuf> },
    Unmount,
    Remount { sources: Vec<PathBuf> },
}

impl Action {
    pub fn is_noop(&self) -> bool {
        matches!(self, Action::NoOp)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::NoOp => "no-op",
            Action::Mount { .. } => "mount",
            Action::Unmount => "unmount",
            Action::Remount { .. } => "remount",
        }
    }
}

/// Outcome of reconciling a single mount point
#[derive(Debug)]
pub struct MountOutcome {
    pub mount_point: PathBuf,
    #[allow(dead_code)] // Logged at decision time; read back in tests
    pub state: MountState,
    pub action: Action,
    pub result: Result<()>,
}

impl MountOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything one reconciliation pass did, mount point by mount point
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<MountOutcome>,
}

impl PassReport {
    /// True when every mount point ended the pass in its desired state
    #[allow(dead_code)]
    // Used in tests; the daemon reads the counts instead
    pub fn converged(&self) -> bool {
        self.outcomes.iter().all(MountOutcome::succeeded)
    }

    pub fn actions_applied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.action.is_noop() && o.succeeded())
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MountOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}
