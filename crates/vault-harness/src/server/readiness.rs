//! Blocking wait for the service listener.

use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::SERVER_TARGET;
use super::error::ServerError;
use super::socket::{ListenAddress, is_listening};

/// Blocks until `address` accepts TCP connections.
///
/// The child's exit status is checked before every connection attempt, so a process that
/// dies during startup fails with [`ServerError::ExitedEarly`] immediately
/// instead of waiting out the deadline.
pub(crate) fn wait_for_listener(
    child: &mut Child,
    address: &ListenAddress,
    timeout: Duration,
    interval: Duration,
) -> Result<(), ServerError> {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0_u32;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| ServerError::Monitor { source })?
        {
            return Err(ServerError::ExitedEarly {
                status: status.code(),
            });
        }
        attempts += 1;
        if is_listening(address)? {
            debug!(target: SERVER_TARGET, %address, attempts, "server is accepting connections");
            return Ok(());
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(ServerError::StartupTimeout {
                address: address.to_string(),
                timeout,
            });
        }
        thread::sleep(interval.min(deadline - now));
    }
}
