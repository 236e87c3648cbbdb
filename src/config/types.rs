use std::path::PathBuf;

/// One configured union: a mount point and the ordered list of source
/// directories that should back it whenever they exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub mount_point: PathBuf,
    pub sources: Vec<PathBuf>,
}
