use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnionwatchError {
    #[error("Platform not supported: {platform}")]
    PlatformNotSupported { platform: String },

    #[error("Required tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Root privileges required to manage mounts; rerun under sudo")]
    PrivilegeRequired,

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("{path}:{line}: {message}")]
    ConfigInvalid {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Cannot read mount table {path}: {error}")]
    MountTableUnreadable { path: PathBuf, error: std::io::Error },

    #[error("Mount failed for {target}: {detail}")]
    MountFailed {
        target: PathBuf,
        command: String,
        detail: String,
    },

    #[error("Unmount failed for {target}: {detail}")]
    UnmountFailed {
        target: PathBuf,
        command: String,
        detail: String,
    },

    #[error("Command timeout: {command} timed out after {timeout_secs} seconds")]
    CommandTimeout { command: String, timeout_secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnionwatchError {
    /// Command line and captured output for errors that came out of an
    /// external command, used to feed the command failure log.
    pub fn command_detail(&self) -> Option<(&str, &str)> {
        match self {
            UnionwatchError::MountFailed {
                command, detail, ..
            }
            | UnionwatchError::UnmountFailed {
                command, detail, ..
            } => Some((command, detail)),
            UnionwatchError::CommandTimeout { command, .. } => Some((command, "timed out")),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, UnionwatchError>;
