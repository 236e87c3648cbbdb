use std::path::PathBuf;
use tracing::debug;

/// Filter the configured sources down to the effective set: the ones
/// that exist as directories right now, in configuration order. Paths
/// are canonicalized so they compare equal to what the kernel reports
/// in the mount table.
pub fn resolve_sources(configured: &[PathBuf]) -> Vec<PathBuf> {
    let mut effective = Vec::with_capacity(configured.len());
    for source in configured {
        if source.is_dir() {
            let resolved =
                std::fs::canonicalize(source).unwrap_or_else(|_| source.clone());
            effective.push(resolved);
        } else {
            debug!("Source unavailable: {}", source.display());
        }
    }
    effective
}
