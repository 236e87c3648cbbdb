use super::backend::MountBackend;
use super::table::{MountEntry, MountTable};
use crate::error::{Result, UnionwatchError};
use crate::platform::linux::MERGERFS_FSTYPE;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Mock mount backend for engine tests. Every mount point holds a stack
/// of source sets, mirroring how real mounts shadow each other, and
/// `read_table` renders the stacks as mountinfo entries so the table
/// queries under test are the real ones.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    mounts: BTreeMap<PathBuf, Vec<Vec<PathBuf>>>,
    fail_mounts: bool,
    fail_unmounts: bool,
    fail_table_reads: bool,
    absorb_unmounts: bool,
    mount_calls: Vec<(Vec<PathBuf>, PathBuf)>,
    unmount_calls: Vec<PathBuf>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a mount layer directly, as if something mounted it before
    /// the daemon started.
    pub fn seed_mount(&self, target: &Path, sources: &[PathBuf]) {
        self.state
            .lock()
            .unwrap()
            .mounts
            .entry(target.to_path_buf())
            .or_default()
            .push(sources.to_vec());
    }

    pub fn set_fail_mounts(&self, fail: bool) {
        self.state.lock().unwrap().fail_mounts = fail;
    }

    pub fn set_fail_unmounts(&self, fail: bool) {
        self.state.lock().unwrap().fail_unmounts = fail;
    }

    pub fn set_fail_table_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_table_reads = fail;
    }

    /// Unmount calls report success but remove nothing
    pub fn set_absorb_unmounts(&self, absorb: bool) {
        self.state.lock().unwrap().absorb_unmounts = absorb;
    }

    pub fn mount_calls(&self) -> Vec<(Vec<PathBuf>, PathBuf)> {
        self.state.lock().unwrap().mount_calls.clone()
    }

    pub fn unmount_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().unmount_calls.clone()
    }

    pub fn stack_depth(&self, target: &Path) -> usize {
        self.state
            .lock()
            .unwrap()
            .mounts
            .get(target)
            .map_or(0, Vec::len)
    }

    pub fn top_sources(&self, target: &Path) -> Option<Vec<PathBuf>> {
        self.state
            .lock()
            .unwrap()
            .mounts
            .get(target)
            .and_then(|layers| layers.last().cloned())
    }
}

#[async_trait]
impl MountBackend for MockBackend {
    async fn read_table(&self) -> Result<MountTable> {
        let state = self.state.lock().unwrap();
        if state.fail_table_reads {
            return Err(UnionwatchError::MountTableUnreadable {
                path: PathBuf::from("/proc/self/mountinfo"),
                error: std::io::Error::other("mock table read failed"),
            });
        }

        // A root filesystem entry so bind source recovery has a parent
        let mut entries = vec![MountEntry {
            mount_id: 1,
            parent_id: 0,
            device: "8:1".to_string(),
            root: PathBuf::from("/"),
            mount_point: PathBuf::from("/"),
            fs_type: "ext4".to_string(),
            source: "/dev/sda1".to_string(),
        }];

        let mut next_id = 100;
        for (target, layers) in &state.mounts {
            for layer in layers {
                let entry = if layer.len() >= 2 {
                    MountEntry {
                        mount_id: next_id,
                        parent_id: 1,
                        device: format!("0:{next_id}"),
                        root: PathBuf::from("/"),
                        mount_point: target.clone(),
                        fs_type: MERGERFS_FSTYPE.to_string(),
                        source: layer
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(":"),
                    }
                } else {
                    MountEntry {
                        mount_id: next_id,
                        parent_id: 1,
                        device: "8:1".to_string(),
                        root: layer.first().cloned().unwrap_or_default(),
                        mount_point: target.clone(),
                        fs_type: "ext4".to_string(),
                        source: "/dev/sda1".to_string(),
                    }
                };
                entries.push(entry);
                next_id += 1;
            }
        }

        Ok(MountTable::from_entries(entries))
    }

    async fn mount(&self, sources: &[PathBuf], target: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .mount_calls
            .push((sources.to_vec(), target.to_path_buf()));

        if state.fail_mounts {
            return Err(UnionwatchError::MountFailed {
                target: target.to_path_buf(),
                command: format!("mock-mount {}", target.display()),
                detail: "mock mount failed".to_string(),
            });
        }

        if sources.is_empty() {
            return Ok(());
        }

        // Real mounts stack on top of whatever is already there
        state
            .mounts
            .entry(target.to_path_buf())
            .or_default()
            .push(sources.to_vec());
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.unmount_calls.push(target.to_path_buf());

        if state.fail_unmounts {
            return Err(UnionwatchError::UnmountFailed {
                target: target.to_path_buf(),
                command: format!("mock-umount {}", target.display()),
                detail: "mock unmount failed".to_string(),
            });
        }

        if state.absorb_unmounts {
            return Ok(());
        }

        match state.mounts.get_mut(target) {
            Some(layers) => {
                layers.pop();
                if layers.is_empty() {
                    state.mounts.remove(target);
                }
                Ok(())
            }
            None => Err(UnionwatchError::UnmountFailed {
                target: target.to_path_buf(),
                command: format!("mock-umount {}", target.display()),
                detail: "not mounted".to_string(),
            }),
        }
    }

    fn mount_command(&self, sources: &[PathBuf], target: &Path) -> String {
        format!(
            "mock-mount {} {}",
            sources
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(":"),
            target.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_stacks_and_drains() {
        let backend = MockBackend::new();
        let target = Path::new("/mnt/test");
        let first = vec![PathBuf::from("/srv/a")];
        let second = vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")];

        backend.mount(&first, target).await.unwrap();
        backend.mount(&second, target).await.unwrap();
        assert_eq!(backend.stack_depth(target), 2);

        let table = backend.read_table().await.unwrap();
        assert_eq!(table.mount_count(target), 2);
        // Topmost layer wins
        assert_eq!(table.mounted_sources(target), second);

        backend.unmount(target).await.unwrap();
        let table = backend.read_table().await.unwrap();
        assert_eq!(table.mounted_sources(target), first);

        backend.unmount(target).await.unwrap();
        let table = backend.read_table().await.unwrap();
        assert!(!table.is_mounted(target));

        // Unmounting an empty mount point is an error, like real umount
        assert!(backend.unmount(target).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_backend_renders_bind_entries() {
        let backend = MockBackend::new();
        let target = Path::new("/mnt/docs");
        backend.seed_mount(target, &[PathBuf::from("/srv/docs")]);

        let table = backend.read_table().await.unwrap();
        assert_eq!(
            table.mounted_sources(target),
            vec![PathBuf::from("/srv/docs")]
        );
    }

    #[tokio::test]
    async fn test_mock_backend_failure_modes() {
        let backend = MockBackend::new();
        let target = Path::new("/mnt/test");
        let sources = vec![PathBuf::from("/srv/a")];

        backend.set_fail_mounts(true);
        assert!(backend.mount(&sources, target).await.is_err());
        assert_eq!(backend.stack_depth(target), 0);

        backend.set_fail_mounts(false);
        backend.mount(&sources, target).await.unwrap();

        backend.set_absorb_unmounts(true);
        backend.unmount(target).await.unwrap();
        assert_eq!(backend.stack_depth(target), 1);

        backend.set_absorb_unmounts(false);
        backend.set_fail_unmounts(true);
        assert!(backend.unmount(target).await.is_err());
        assert_eq!(backend.stack_depth(target), 1);

        backend.set_fail_table_reads(true);
        assert!(matches!(
            backend.read_table().await,
            Err(UnionwatchError::MountTableUnreadable { .. })
        ));
        backend.set_fail_table_reads(false);
        assert!(backend.read_table().await.is_ok());

        assert_eq!(backend.mount_calls().len(), 2);
        assert_eq!(backend.unmount_calls().len(), 2);
    }
}
