#![cfg(test)]

use tempfile::TempDir;
use unionwatch::platform::ensure_root;
use unionwatch::{ConvergenceEngine, MountSpec, detect_platform, get_mount_backend};

#[tokio::test]
#[cfg_attr(not(target_os = "linux"), ignore)]
async fn test_convergence_against_real_mounts() {
    // This test needs root plus mergerfs and inotify-tools installed
    if std::env::var("UNIONWATCH_INTEGRATION_TESTS").is_err() {
        eprintln!("Skipping integration test. Set UNIONWATCH_INTEGRATION_TESTS=1 to run.");
        return;
    }

    let platform_info = detect_platform().expect("Failed to detect platform");
    if !platform_info.can_mount() {
        eprintln!("Skipping test: mount tools not available");
        eprintln!("Missing tools: {:?}", platform_info.missing_tools());
        return;
    }
    if ensure_root().is_err() {
        eprintln!("Skipping test: must run as root");
        return;
    }

    let temp_dir = TempDir::new().unwrap();
    let source1 = temp_dir.path().join("source1");
    let source2 = temp_dir.path().join("source2");
    let target = temp_dir.path().join("merged");

    std::fs::create_dir_all(&source1).unwrap();
    std::fs::create_dir_all(&source2).unwrap();
    std::fs::write(source1.join("file1.txt"), "content1").unwrap();
    std::fs::write(source2.join("file2.txt"), "content2").unwrap();

    let backend = get_mount_backend(&platform_info).expect("Failed to create mount backend");
    let engine = ConvergenceEngine::new(backend.as_ref());
    let specs = vec![MountSpec {
        mount_point: target.clone(),
        sources: vec![source1.clone(), source2.clone()],
    }];

    // First pass mounts the union and merges both sources
    let report = engine.run_pass(&specs, false).await.expect("Pass failed");
    assert!(report.converged());
    assert!(target.join("file1.txt").exists());
    assert!(target.join("file2.txt").exists());

    // Second pass finds nothing to do
    let report = engine.run_pass(&specs, false).await.expect("Pass failed");
    assert!(report.converged());
    assert_eq!(report.actions_applied(), 0);

    // A source going away triggers a remount with the survivors
    std::fs::remove_dir_all(&source2).unwrap();
    let report = engine.run_pass(&specs, false).await.expect("Pass failed");
    assert!(report.converged());
    assert_eq!(report.actions_applied(), 1);
    assert!(target.join("file1.txt").exists());
    assert!(!target.join("file2.txt").exists());

    backend.unmount(&target).await.expect("Cleanup unmount failed");
}
