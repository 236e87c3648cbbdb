use crate::error::{Result, UnionwatchError};
use crate::platform::linux::{INOTIFYWAIT_BIN, MERGERFS_BIN, MOUNT_BIN, UMOUNT_BIN};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum Platform {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    Linux(LinuxInfo),
    #[allow(dead_code)] // Needed for exhaustive matching but only constructed on non-Linux
    Unsupported(String),
}

/// What detection found on a Linux host. Tool paths are `None` when the
/// tool is not on PATH; callers decide which absences are fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct LinuxInfo {
    pub distro: String,
    pub version: String,
    pub mount_path: Option<PathBuf>,
    pub umount_path: Option<PathBuf>,
    pub mergerfs_path: Option<PathBuf>,
    pub mergerfs_version: Option<String>,
    pub inotifywait_path: Option<PathBuf>,
    pub fuse_available: bool,
}

#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub platform: Platform,
}

impl PlatformInfo {
    /// Names of required external tools that were not found on PATH.
    pub fn missing_tools(&self) -> Vec<&'static str> {
        match &self.platform {
            Platform::Linux(info) => {
                let mut missing = Vec::new();
                if info.mount_path.is_none() {
                    missing.push(MOUNT_BIN);
                }
                if info.umount_path.is_none() {
                    missing.push(UMOUNT_BIN);
                }
                if info.mergerfs_path.is_none() {
                    missing.push(MERGERFS_BIN);
                }
                if info.inotifywait_path.is_none() {
                    missing.push(INOTIFYWAIT_BIN);
                }
                missing
            }
            Platform::Unsupported(_) => Vec::new(),
        }
    }

    #[allow(dead_code)]
    // Used in tests, could be useful for diagnostics
    pub fn can_mount(&self) -> bool {
        match &self.platform {
            Platform::Linux(info) => info.fuse_available && self.missing_tools().is_empty(),
            Platform::Unsupported(_) => false,
        }
    }
}

pub fn detect_platform() -> Result<PlatformInfo> {
    debug!("Starting platform detection");

    #[cfg(target_os = "linux")]
    {
        detect_linux()
    }

    #[cfg(not(target_os = "linux"))]
    {
        let os = std::env::consts::OS;
        Ok(PlatformInfo {
            platform: Platform::Unsupported(os.to_string()),
        })
    }
}

/// Mounting and unmounting need root. The daemon refuses to start
/// without it instead of re-invoking itself under sudo.
pub fn ensure_root() -> Result<()> {
    #[cfg(unix)]
    {
        if nix::unistd::geteuid().is_root() {
            Ok(())
        } else {
            Err(UnionwatchError::PrivilegeRequired)
        }
    }

    #[cfg(not(unix))]
    {
        Err(UnionwatchError::PlatformNotSupported {
            platform: std::env::consts::OS.to_string(),
        })
    }
}

#[cfg(target_os = "linux")]
fn detect_linux() -> Result<PlatformInfo> {
    let (distro, version) = detect_linux_distro();
    info!("Detected Linux distribution: {} {}", distro, version);

    let mount_path = find_tool(MOUNT_BIN);
    let umount_path = find_tool(UMOUNT_BIN);
    let mergerfs_path = find_tool(MERGERFS_BIN);
    let inotifywait_path = find_tool(INOTIFYWAIT_BIN);

    let mergerfs_version = mergerfs_path.as_ref().and_then(|_| probe_mergerfs_version());
    match &mergerfs_version {
        Some(v) => info!("Found mergerfs version: {}", v),
        None if mergerfs_path.is_some() => info!("Found mergerfs, version unknown"),
        None => info!("mergerfs not found"),
    }

    let fuse_available = check_fuse_support();
    if fuse_available {
        info!("FUSE support detected");
    } else {
        info!("FUSE support not detected");
    }

    let linux_info = LinuxInfo {
        distro,
        version,
        mount_path,
        umount_path,
        mergerfs_path,
        mergerfs_version,
        inotifywait_path,
        fuse_available,
    };

    Ok(PlatformInfo {
        platform: Platform::Linux(linux_info),
    })
}

#[cfg(target_os = "linux")]
fn find_tool(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(path) => {
            debug!("Found {} at {}", name, path.display());
            Some(path)
        }
        Err(_) => None,
    }
}

#[cfg(target_os = "linux")]
fn detect_linux_distro() -> (String, String) {
    // /etc/os-release is the systemd standard
    if let Ok(content) = std::fs::read_to_string("/etc/os-release") {
        let mut name = "Unknown".to_string();
        let mut version = "Unknown".to_string();

        for line in content.lines() {
            if let Some(value) = line.strip_prefix("NAME=") {
                name = value.trim_matches('"').to_string();
            } else if let Some(value) = line.strip_prefix("VERSION_ID=") {
                version = value.trim_matches('"').to_string();
            }
        }

        return (name, version);
    }

    ("Unknown Linux".to_string(), "Unknown".to_string())
}

#[cfg(target_os = "linux")]
fn probe_mergerfs_version() -> Option<String> {
    let output = std::process::Command::new(MERGERFS_BIN).arg("-V").output().ok()?;
    let version_str = String::from_utf8_lossy(&output.stdout);
    let version_line = version_str.lines().next()?;
    version_line
        .split_whitespace()
        .find(|s| s.chars().any(|c| c.is_ascii_digit()))
        .map(|s| s.to_string())
}

#[cfg(target_os = "linux")]
fn check_fuse_support() -> bool {
    use std::path::Path;

    // Check if the FUSE module is loaded
    if Path::new("/sys/module/fuse").exists() {
        return true;
    }

    if Path::new("/dev/fuse").exists() {
        return true;
    }

    // Module present but not loaded still counts; mergerfs will load it
    if let Ok(output) = std::process::Command::new("modinfo").arg("fuse").output() {
        return output.status.success();
    }

    false
}
