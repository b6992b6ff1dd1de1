//! Server process supervision and initialisation.
//!
//! [`ServerManager`] composes the pieces: spawning with piped output,
//! readiness probing, the init/unseal state machine, and graceful shutdown.

mod coordinator;
mod error;
mod manager;
mod readiness;
mod shutdown;
mod socket;
mod spawning;

pub use coordinator::{SealState, SystemBackend, UnsealKeys};
pub use error::ServerError;
pub use manager::ServerManager;
pub use socket::ListenAddress;
pub use spawning::LaunchCommand;

pub(crate) const SERVER_TARGET: &str = module_path!();
