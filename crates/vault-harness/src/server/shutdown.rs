//! Graceful termination of the server process.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::SERVER_TARGET;
use super::error::ServerError;

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sends SIGTERM, waits up to `grace`, then kills and reaps the child.
///
/// Returns the exit status once the child has been reaped.
pub(crate) fn terminate(child: &mut Child, grace: Duration) -> Result<ExitStatus, ServerError> {
    if let Some(status) = child
        .try_wait()
        .map_err(|source| ServerError::Monitor { source })?
    {
        return Ok(status);
    }

    request_stop(child.id())?;
    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| ServerError::Monitor { source })?
        {
            debug!(target: SERVER_TARGET, ?status, "server exited after SIGTERM");
            return Ok(status);
        }
        thread::sleep(REAP_POLL_INTERVAL);
    }

    warn!(
        target: SERVER_TARGET,
        pid = child.id(),
        grace_ms = grace.as_millis(),
        "server ignored SIGTERM; killing"
    );
    force_kill(child)
}

/// Kills the child without a grace period and reaps it.
pub(crate) fn force_kill(child: &mut Child) -> Result<ExitStatus, ServerError> {
    match child.kill() {
        Ok(()) => {}
        // Already exited between the last poll and the kill.
        Err(error) if error.kind() == io::ErrorKind::InvalidInput => {}
        Err(source) => return Err(ServerError::Monitor { source }),
    }
    child
        .wait()
        .map_err(|source| ServerError::Monitor { source })
}

#[cfg(unix)]
fn request_stop(pid: u32) -> Result<(), ServerError> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).map_err(|_| ServerError::Signal {
        pid,
        source: io::Error::from(io::ErrorKind::InvalidInput),
    })?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(ServerError::Signal {
            pid,
            source: io::Error::from(errno),
        }),
    }
}

#[cfg(not(unix))]
fn request_stop(_pid: u32) -> Result<(), ServerError> {
    // No graceful signal; the grace loop falls through to `kill`.
    Ok(())
}
