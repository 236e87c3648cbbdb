use crate::platform::linux::MERGERFS_FSTYPE;
use std::path::{Path, PathBuf};

/// One line of /proc/self/mountinfo.
/// Format: mount_id parent_id major:minor root mount_point options
/// [optional fields...] - fstype source super_options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub mount_id: u32,
    #[allow(dead_code)] // Part of the mountinfo record; nothing walks the hierarchy
    pub parent_id: u32,
    /// major:minor of the backing device
    pub device: String,
    /// Path within the backing filesystem that is mounted here
    pub root: PathBuf,
    pub mount_point: PathBuf,
    pub fs_type: String,
    /// Mount source as reported by the kernel. For mergerfs this is the
    /// fsname, which the executor pins to the colon-joined source list.
    pub source: String,
}

/// Immutable snapshot of the kernel mount table, in mount order. Later
/// entries at the same mount point shadow earlier ones.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    #[allow(dead_code)]
    // Used by the mock backend to build tables without parsing
    pub fn from_entries(entries: Vec<MountEntry>) -> Self {
        Self { entries }
    }

    /// Parse mountinfo content. Malformed lines are skipped; the kernel
    /// writes this file, so anything unparseable is not ours to fix.
    pub fn parse(content: &str) -> Self {
        let mut entries = Vec::new();

        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 {
                continue;
            }

            let Ok(mount_id) = fields[0].parse::<u32>() else {
                continue;
            };
            let parent_id: u32 = fields[1].parse().unwrap_or(0);

            // Optional fields end at the "-" separator
            let Some(separator_pos) = fields.iter().position(|&f| f == "-") else {
                continue;
            };
            if separator_pos + 2 >= fields.len() {
                continue;
            }

            entries.push(MountEntry {
                mount_id,
                parent_id,
                device: fields[2].to_string(),
                root: PathBuf::from(unescape(fields[3])),
                mount_point: PathBuf::from(unescape(fields[4])),
                fs_type: fields[separator_pos + 1].to_string(),
                source: unescape(fields[separator_pos + 2]),
            });
        }

        Self { entries }
    }

    #[allow(dead_code)]
    // Used in tests, could be useful for diagnostics
    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn is_mounted(&self, mount_point: &Path) -> bool {
        self.top_entry(mount_point).is_some()
    }

    /// Number of stacked mounts at this mount point. Each needs its own
    /// unmount call before the path is clear.
    pub fn mount_count(&self, mount_point: &Path) -> usize {
        let target = canon(mount_point);
        self.entries
            .iter()
            .filter(|e| e.mount_point == target)
            .count()
    }

    /// Source directories of the topmost mount at this mount point, or
    /// an empty vec when nothing is mounted there. A mergerfs entry
    /// reports all branches; anything else is treated as a single-source
    /// mount whose origin is recovered from the root field.
    pub fn mounted_sources(&self, mount_point: &Path) -> Vec<PathBuf> {
        let Some(top) = self.top_entry(mount_point) else {
            return Vec::new();
        };
        if top.fs_type == MERGERFS_FSTYPE {
            top.source.split(':').map(PathBuf::from).collect()
        } else {
            vec![self.bind_source(top)]
        }
    }

    fn top_entry(&self, mount_point: &Path) -> Option<&MountEntry> {
        let target = canon(mount_point);
        self.entries
            .iter()
            .filter(|e| e.mount_point == target)
            .next_back()
    }

    /// Recover the path a bind mount was created from. mountinfo only
    /// records the device and the root within it, so the original path
    /// is reconstructed through the mount that exposes that device:
    /// the same-device entry with the shortest root still prefixing
    /// ours, earliest in mount order on a tie. That picks the plain
    /// filesystem mount over other binds of the same device.
    fn bind_source(&self, entry: &MountEntry) -> PathBuf {
        let mut parent: Option<&MountEntry> = None;
        for cand in &self.entries {
            if cand.mount_id == entry.mount_id
                || cand.device != entry.device
                || cand.mount_point == entry.mount_point
            {
                continue;
            }
            if !entry.root.starts_with(&cand.root) {
                continue;
            }
            let better = match parent {
                None => true,
                Some(p) => cand.root.as_os_str().len() < p.root.as_os_str().len(),
            };
            if better {
                parent = Some(cand);
            }
        }

        match parent {
            Some(p) => {
                let rel = entry.root.strip_prefix(&p.root).unwrap_or(&entry.root);
                if rel.as_os_str().is_empty() {
                    p.mount_point.clone()
                } else {
                    p.mount_point.join(rel)
                }
            }
            // No view of the device exists; the root path is the best
            // answer available and will read as stale, which is right.
            None => entry.root.clone(),
        }
    }
}

fn canon(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Decode the octal escapes mountinfo uses for whitespace and backslash
/// (\040 for space and so on). Escapes above \377 do not fit in a byte
/// and stay verbatim.
fn unescape(field: &str) -> String {
    let is_octal = |b: u8| (b'0'..=b'7').contains(&b);
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && is_octal(bytes[i + 1])
            && is_octal(bytes[i + 2])
            && is_octal(bytes[i + 3])
        {
            let value = u32::from(bytes[i + 1] - b'0') * 64
                + u32::from(bytes[i + 2] - b'0') * 8
                + u32::from(bytes[i + 3] - b'0');
            if let Ok(byte) = u8::try_from(value) {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
