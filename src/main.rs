use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod daemon;
mod error;
mod mount;
mod platform;
mod watch;

use config::ConfigFile;
use daemon::{Daemon, Shutdown};
use error::UnionwatchError;
use mount::get_mount_backend;
use platform::{Platform, detect_platform, ensure_root};
use watch::MountWatcher;

#[derive(Parser)]
#[command(name = "unionwatch")]
#[command(about = "Keeps union mount points converged with the source directories that exist")]
#[command(version)]
struct Cli {
    /// Mount configuration file (defaults to ~/.config/unionwatch/mounts.conf)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    info!("Starting unionwatch v{}", env!("CARGO_PKG_VERSION"));

    let platform_info = detect_platform()?;
    if let Platform::Linux(linux) = &platform_info.platform {
        info!(
            "Detected {} {} (mergerfs {})",
            linux.distro,
            linux.version,
            linux.mergerfs_version.as_deref().unwrap_or("not found")
        );
    }

    let missing = platform_info.missing_tools();
    if !missing.is_empty() {
        for tool in &missing {
            error!("Required tool not found: {tool}");
        }
        return Err(UnionwatchError::ToolNotFound {
            tool: missing.join(", "),
        }
        .into());
    }
    ensure_root()?;

    let backend = get_mount_backend(&platform_info)?;
    let watcher = MountWatcher::new(&platform_info)?;
    let config = match cli.config {
        Some(path) => ConfigFile::with_path(path),
        None => ConfigFile::new()?,
    };

    let mut shutdown = Shutdown::install()?;
    let mut daemon = Daemon::new(config, backend, watcher);
    daemon.run(&mut shutdown).await?;
    Ok(())
}
