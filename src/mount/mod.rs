mod backend;
mod engine;
mod executor;
pub mod resolver;
mod table;
mod types;

#[cfg(test)]
mod mock;

pub use backend::{MountBackend, get_mount_backend};
pub use engine::{ConvergenceEngine, decide};
pub use executor::SystemBackend;
pub use resolver::resolve_sources;
pub use table::{MountEntry, MountTable};
pub use types::{Action, MountOutcome, MountState, PassReport};

#[cfg(test)]
pub use mock::MockBackend;
