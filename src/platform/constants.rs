/// Platform constants for mount operations and event watching.

pub mod linux {
    /// Default mount options for mergerfs union mounts. Write placement
    /// goes to the branch with the most free space, and files are moved
    /// rather than failed when a branch fills up.
    pub const DEFAULT_UNION_OPTIONS: &[&str] =
        &["category.create=mfs", "minfreespace=0", "moveonenospc=true"];

    /// Path to mountinfo for detailed mount information
    pub const PROC_MOUNTINFO: &str = "/proc/self/mountinfo";

    /// Filesystem type identifier for mergerfs
    pub const MERGERFS_FSTYPE: &str = "fuse.mergerfs";

    /// Required external tools
    pub const MOUNT_BIN: &str = "mount";
    pub const UMOUNT_BIN: &str = "umount";
    pub const MERGERFS_BIN: &str = "mergerfs";
    pub const INOTIFYWAIT_BIN: &str = "inotifywait";

    /// Directories watched for media coming and going
    pub const WATCH_ROOTS: &[&str] = &["/media", "/mnt", "/run/media"];

    /// inotify events that can change which sources exist
    pub const WATCH_EVENTS: &[&str] = &["create", "delete", "moved_to", "moved_from", "unmount"];
}

/// Common constants across the daemon
pub mod common {
    use std::time::Duration;

    /// Default permissions for mount point directories
    pub const MOUNT_POINT_PERMISSIONS: u32 = 0o755;

    /// Timeout for mount operations
    pub const MOUNT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for unmount operations
    pub const UNMOUNT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Upper bound on the wait between reconciliation passes. Also how
    /// long a missed filesystem event can delay convergence.
    pub const EVENT_WAIT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum unmount calls against one mount point in a single pass.
    /// Stacked mounts need one call per layer; anything deeper than this
    /// is treated as an unmount failure.
    pub const MAX_UNMOUNT_DRAIN: usize = 16;

    /// How many external command failures the daemon keeps buffered for
    /// the dump on fatal exit
    pub const COMMAND_LOG_CAPACITY: usize = 100;
}
