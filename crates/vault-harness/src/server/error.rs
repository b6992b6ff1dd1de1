//! Error types for server lifecycle operations.

use std::io;
use std::time::Duration;

use thiserror::Error;
use vault_harness_config::ConfigError;

use crate::client::ClientError;

use super::SealState;

/// Errors raised while supervising or initialising the service.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The service binary could not be spawned.
    #[error("failed to spawn server binary '{binary}': {source}")]
    Launch {
        /// Binary as configured.
        binary: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The process exited before its listener came up.
    #[error("server exited before accepting connections (status: {status:?})")]
    ExitedEarly {
        /// Exit code, `None` when terminated by a signal.
        status: Option<i32>,
    },
    /// The listener did not come up before the deadline.
    #[error("server at {address} did not accept connections within {timeout:?}")]
    StartupTimeout {
        /// Address being waited on.
        address: String,
        /// Deadline that expired.
        timeout: Duration,
    },
    /// A readiness connection failed with an error other than "not listening".
    #[error("failed to connect to server listener {address}: {source}")]
    Connect {
        /// Address being connected to.
        address: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Querying the child's exit status failed.
    #[error("failed to monitor server process: {source}")]
    Monitor {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The configured address has no host or port to connect to.
    #[error("server address '{address}' does not name a host and port")]
    Address {
        /// Address as configured.
        address: String,
    },
    /// `start()` was called while a process is already running.
    #[error("server process is already running")]
    AlreadyStarted,
    /// An operation needed a running process.
    #[error("server process has not been started")]
    NotStarted,
    /// The service was initialised already.
    #[error("server is already initialized")]
    AlreadyInitialized,
    /// The service rejected an unseal share.
    #[error("unseal share {index} was rejected with HTTP {status}: {body}")]
    UnsealShareRejected {
        /// Zero-based position of the share.
        index: usize,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The threshold was reached but the service stayed sealed.
    #[error("server is still sealed after {submitted} of {threshold} shares")]
    StillSealed {
        /// Shares accepted by the service.
        submitted: usize,
        /// Declared threshold.
        threshold: usize,
    },
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {operation} while server is {state}")]
    InvalidState {
        /// Operation attempted.
        operation: &'static str,
        /// Current state.
        state: SealState,
    },
    /// The init response carried no root credential or too few shares.
    #[error("init response is malformed: {reason}")]
    MalformedInit {
        /// What was wrong.
        reason: String,
    },
    /// The manager has been stopped.
    #[error("server manager has been stopped")]
    Stopped,
    /// Sending a termination signal failed.
    #[error("failed to signal server pid {pid}: {source}")]
    Signal {
        /// Target process.
        pid: u32,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Configuration was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A request to the service failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}
