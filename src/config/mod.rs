mod parser;
mod types;

pub use types::MountSpec;

use crate::error::{Result, UnionwatchError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Handle to the mount configuration file. The file is re-read on every
/// reconciliation pass so edits take effect without a restart.
pub struct ConfigFile {
    config_path: PathBuf,
}

impl ConfigFile {
    pub fn new() -> Result<Self> {
        let config_path = default_config_path()?;
        Ok(Self { config_path })
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<Vec<MountSpec>> {
        if !self.config_path.exists() {
            return Err(UnionwatchError::ConfigNotFound {
                path: self.config_path.clone(),
            });
        }

        debug!("Loading config from {}", self.config_path.display());
        let contents = fs::read_to_string(&self.config_path)?;
        parser::parse(&self.config_path, &contents)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| std::io::Error::other("could not determine config directory"))?;
    Ok(config_dir.join("unionwatch").join("mounts.conf"))
}
