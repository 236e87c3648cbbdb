use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{debug, error, info, trace};

use crate::config::ConfigFile;
use crate::error::{Result, UnionwatchError};
use crate::mount::{ConvergenceEngine, MountBackend, PassReport};
use crate::platform::common::COMMAND_LOG_CAPACITY;
use crate::watch::{MountWatcher, WatchOutcome};

/// Resolves once SIGINT or SIGTERM arrives, and stays resolved
pub struct Shutdown {
    sigint: Signal,
    sigterm: Signal,
    fired: bool,
}

impl Shutdown {
    pub fn install() -> Result<Self> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            fired: false,
        })
    }

    pub async fn recv(&mut self) {
        if self.fired {
            return;
        }
        tokio::select! {
            _ = self.sigint.recv() => {}
            _ = self.sigterm.recv() => {}
        }
        self.fired = true;
    }

    pub fn is_shutdown(&self) -> bool {
        self.fired
    }
}

/// One captured external command failure
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub at: DateTime<Utc>,
    pub mount_point: PathBuf,
    pub command: String,
    pub detail: String,
}

/// Bounded buffer of recent command failures. Individual failures only
/// warrant a log line at the time, but the whole buffer is dumped when
/// the daemon exits on a fatal error to leave a trail worth debugging.
#[derive(Debug, Default)]
pub struct CommandLog {
    entries: VecDeque<CommandFailure>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: CommandFailure) {
        if self.entries.len() == COMMAND_LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(failure);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandFailure> {
        self.entries.iter()
    }
}

/// The long-running reconciliation loop: converge, wait for a
/// filesystem event or the timeout, converge again.
pub struct Daemon {
    config: ConfigFile,
    backend: Box<dyn MountBackend>,
    watcher: MountWatcher,
    command_log: CommandLog,
}

impl Daemon {
    pub fn new(config: ConfigFile, backend: Box<dyn MountBackend>, watcher: MountWatcher) -> Self {
        Self {
            config,
            backend,
            watcher,
            command_log: CommandLog::new(),
        }
    }

    #[allow(dead_code)]
    // Read in tests; the daemon itself only dumps the log on a fatal exit
    pub fn command_log(&self) -> &CommandLog {
        &self.command_log
    }

    pub async fn run(&mut self, shutdown: &mut Shutdown) -> Result<()> {
        info!(
            "Watching for mount and media changes (config: {})",
            self.config.path().display()
        );

        loop {
            if shutdown.is_shutdown() {
                break;
            }

            if let Err(e) = self.reconcile().await {
                self.dump_command_log();
                return Err(e);
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                outcome = self.watcher.wait() => match outcome {
                    WatchOutcome::Event => debug!("Filesystem change detected"),
                    WatchOutcome::TimedOut => trace!("Wait timed out, re-evaluating"),
                },
            }
        }

        info!("Shutting down");
        Ok(())
    }

    /// One pass: reload the configuration, converge every mount point,
    /// record failures. An error returned from here stops the daemon.
    pub async fn reconcile(&mut self) -> Result<()> {
        let specs = self.config.load()?;
        let engine = ConvergenceEngine::new(self.backend.as_ref());

        match engine.run_pass(&specs, false).await {
            Ok(report) => {
                self.record(&report);
                Ok(())
            }
            // A transiently unreadable mount table skips the pass; the
            // next event or timeout retries it
            Err(e @ UnionwatchError::MountTableUnreadable { .. }) => {
                error!("Skipping pass: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn record(&mut self, report: &PassReport) {
        for outcome in report.failures() {
            if let Err(e) = &outcome.result {
                error!(
                    "{}: {} failed: {}",
                    outcome.mount_point.display(),
                    outcome.action.name(),
                    e
                );
                if let Some((command, detail)) = e.command_detail() {
                    self.command_log.record(CommandFailure {
                        at: Utc::now(),
                        mount_point: outcome.mount_point.clone(),
                        command: command.to_string(),
                        detail: detail.to_string(),
                    });
                }
            }
        }

        let actions = report.actions_applied();
        let failures = report.failure_count();
        if actions > 0 || failures > 0 {
            info!("Pass complete: {actions} action(s) applied, {failures} failure(s)");
        } else {
            debug!("Pass complete: all mount points converged");
        }
    }

    fn dump_command_log(&self) {
        if self.command_log.is_empty() {
            return;
        }
        error!(
            "Last {} external command failure(s):",
            self.command_log.len()
        );
        for f in self.command_log.iter() {
            error!(
                "  [{}] {} ({}): {}",
                f.at.format("%Y-%m-%d %H:%M:%S"),
                f.mount_point.display(),
                f.command,
                f.detail
            );
        }
    }
}
