//! Owner of one server process and its initialisation state.

use std::process::{Child, ExitStatus};
use std::time::Duration;

use camino::Utf8PathBuf;
use tracing::{info, warn};
use vault_harness_config::Config;

use crate::client::VaultClient;
use crate::client::sys::SealStatus;

use super::SERVER_TARGET;
use super::coordinator::{Coordinator, SealState, UnsealKeys};
use super::error::ServerError;
use super::readiness::wait_for_listener;
use super::shutdown::{force_kill, terminate};
use super::socket::ListenAddress;
use super::spawning::{LaunchCommand, ServerProcess};

/// Supervises a test server from spawn to teardown.
///
/// The manager owns the child process, the [`VaultClient`] pointed at it, and
/// the credentials captured during initialisation. [`stop`](Self::stop) runs
/// on drop, so a panicking test still tears the process down.
#[derive(Debug)]
pub struct ServerManager {
    launch: LaunchCommand,
    address: ListenAddress,
    startup_timeout: Duration,
    poll_interval: Duration,
    shutdown_grace: Duration,
    client: VaultClient,
    process: Option<ServerProcess>,
    coordinator: Coordinator,
}

impl ServerManager {
    /// Builds a manager for the given configuration files.
    ///
    /// Nothing is spawned until [`start`](Self::start).
    pub fn new(
        config: &Config,
        config_paths: Vec<Utf8PathBuf>,
        client: VaultClient,
    ) -> Result<Self, ServerError> {
        let shares = config.share_parameters()?;
        let address = ListenAddress::from_url(client.base_url())?;
        let launch = LaunchCommand::new(
            config.server_binary(),
            config.server_arguments().to_vec(),
            config_paths,
        );
        Ok(Self {
            launch,
            address,
            startup_timeout: config.startup_timeout(),
            poll_interval: config.poll_interval(),
            shutdown_grace: config.shutdown_grace(),
            client,
            process: None,
            coordinator: Coordinator::new(shares),
        })
    }

    /// Spawns the server and blocks until its listener accepts connections.
    ///
    /// A process that exits or fails to come up in time is reaped before the
    /// error is returned.
    pub fn start(&mut self) -> Result<(), ServerError> {
        self.ensure_active()?;
        if self.process.is_some() {
            return Err(ServerError::AlreadyStarted);
        }
        let mut process = ServerProcess::spawn(&self.launch)?;
        let ready = wait_for_listener(
            process.child_mut(),
            &self.address,
            self.startup_timeout,
            self.poll_interval,
        );
        match ready {
            Ok(()) => {
                info!(
                    target: SERVER_TARGET,
                    pid = process.id(),
                    address = %self.address,
                    "server is listening"
                );
                self.process = Some(process);
                Ok(())
            }
            Err(error) => {
                warn!(target: SERVER_TARGET, %error, "server failed to start");
                reap(process, self.shutdown_grace);
                Err(error)
            }
        }
    }

    /// Initialises the service, capturing the root credential and shares.
    ///
    /// Runs at most once; later calls fail with
    /// [`ServerError::AlreadyInitialized`] without contacting the service.
    pub fn initialize(&mut self) -> Result<(), ServerError> {
        self.ensure_running()?;
        self.coordinator.initialize(&self.client)
    }

    /// Submits shares until the service is unsealed. A no-op when the
    /// service already reports unsealed.
    pub fn unseal(&mut self) -> Result<(), ServerError> {
        self.ensure_running()?;
        self.coordinator.unseal(&self.client)
    }

    /// Installs the root credential on the client.
    pub fn authenticate_root(&mut self) -> Result<(), ServerError> {
        self.ensure_active()?;
        let Some(token) = self.coordinator.root_token() else {
            return Err(ServerError::InvalidState {
                operation: "authenticate",
                state: self.coordinator.state(),
            });
        };
        self.client.set_token(token.to_owned());
        Ok(())
    }

    /// Reads the live seal status from the service.
    pub fn seal_status(&self) -> Result<SealStatus, ServerError> {
        self.ensure_running()?;
        Ok(self.client.seal_status()?)
    }

    /// Stops the server. Idempotent, and safe when `start` never succeeded.
    ///
    /// Termination failures are logged; afterwards every operation except
    /// `stop` fails with [`ServerError::Stopped`].
    pub fn stop(&mut self) {
        if let Some(process) = self.process.take() {
            reap(process, self.shutdown_grace);
        }
        if self.coordinator.state() != SealState::Stopped {
            self.client.clear_token();
            self.coordinator.mark_stopped();
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SealState {
        self.coordinator.state()
    }

    /// Returns `true` while a spawned process is owned.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Process id of the running server.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(ServerProcess::id)
    }

    /// Root credential captured by [`initialize`](Self::initialize).
    #[must_use]
    pub fn root_token(&self) -> Option<&str> {
        self.coordinator.root_token()
    }

    /// Shares captured by [`initialize`](Self::initialize).
    #[must_use]
    pub const fn unseal_keys(&self) -> Option<&UnsealKeys> {
        self.coordinator.unseal_keys()
    }

    /// Client bound to the managed server.
    #[must_use]
    pub const fn client(&self) -> &VaultClient {
        &self.client
    }

    /// Mutable access to the client, for installing other credentials.
    pub fn client_mut(&mut self) -> &mut VaultClient {
        &mut self.client
    }

    /// Address checked for readiness.
    #[must_use]
    pub const fn listen_address(&self) -> &ListenAddress {
        &self.address
    }

    fn ensure_active(&self) -> Result<(), ServerError> {
        if self.coordinator.state() == SealState::Stopped {
            Err(ServerError::Stopped)
        } else {
            Ok(())
        }
    }

    fn ensure_running(&self) -> Result<(), ServerError> {
        self.ensure_active()?;
        if self.process.is_none() {
            return Err(ServerError::NotStarted);
        }
        Ok(())
    }
}

impl Drop for ServerManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn reap(process: ServerProcess, grace: Duration) {
    reap_with(process, grace, terminate);
}

/// Stops the process with `stop`, falling back to an immediate kill when the
/// graceful path fails so the child is never left unreaped.
fn reap_with<F>(mut process: ServerProcess, grace: Duration, stop: F)
where
    F: FnOnce(&mut Child, Duration) -> Result<ExitStatus, ServerError>,
{
    let pid = process.id();
    let outcome = stop(process.child_mut(), grace).or_else(|error| {
        warn!(target: SERVER_TARGET, pid, %error, "graceful stop failed; killing server");
        force_kill(process.child_mut())
    });
    match outcome {
        Ok(status) => {
            info!(target: SERVER_TARGET, pid, ?status, "server stopped");
            process.join_drains();
        }
        Err(error) => {
            warn!(target: SERVER_TARGET, pid, %error, "failed to stop server");
        }
    }
}
