//! Loopback LDAP double.
//!
//! [`MockLdapServer`] binds an ephemeral port on `127.0.0.1` and accepts
//! connections on a background thread, closing each one immediately. That is
//! enough for the service to accept an auth-method configuration pointing at
//! it and for reachability checks. The fixed directory layout is exposed so
//! callers can build a matching configuration.

use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::ldap::LdapConfig;

const LDAP_TARGET: &str = module_path!();
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors raised by the LDAP double.
#[derive(Debug, Error)]
pub enum LdapError {
    /// The listener could not be bound or configured.
    #[error("failed to bind LDAP double: {source}")]
    Bind {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Directory served by the LDAP double.
pub mod directory {
    /// DN used to bind for searches.
    pub const BIND_DN: &str = "cn=admin,dc=hvac,dc=network";
    /// Password for [`BIND_DN`].
    pub const BIND_PASSWORD: &str = "notaverygoodpassword";
    /// Base DN for users.
    pub const USERS_DN: &str = "dc=users,dc=hvac,dc=network";
    /// Base DN for groups.
    pub const GROUPS_DN: &str = "ou=groups,dc=hvac,dc=network";
    /// Seeded user.
    pub const USER_NAME: &str = "somedude";
    /// Password of [`USER_NAME`].
    pub const USER_PASSWORD: &str = "hvacrox";
    /// Seeded group containing [`USER_NAME`].
    pub const GROUP_NAME: &str = "vault-users";
    /// Attribute naming users.
    pub const USER_ATTRIBUTE: &str = "uid";
    /// Attribute naming groups.
    pub const GROUP_ATTRIBUTE: &str = "cn";
}

#[derive(Debug)]
struct Running {
    address: SocketAddr,
    stop: Arc<AtomicBool>,
    accept_loop: JoinHandle<()>,
}

/// Loopback LDAP double with a fixed directory layout.
#[derive(Debug, Default)]
pub struct MockLdapServer {
    running: Option<Running>,
    connections: Arc<AtomicUsize>,
}

impl MockLdapServer {
    /// Creates a stopped double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds an ephemeral loopback port and starts accepting. A no-op when
    /// already running.
    pub fn start(&mut self) -> Result<(), LdapError> {
        if self.running.is_some() {
            return Ok(());
        }
        let listener =
            TcpListener::bind(("127.0.0.1", 0)).map_err(|source| LdapError::Bind { source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| LdapError::Bind { source })?;
        let address = listener
            .local_addr()
            .map_err(|source| LdapError::Bind { source })?;

        let stop = Arc::new(AtomicBool::new(false));
        let accept_loop = spawn_accept_loop(listener, Arc::clone(&stop), Arc::clone(&self.connections));
        info!(target: LDAP_TARGET, %address, "LDAP double listening");
        self.running = Some(Running {
            address,
            stop,
            accept_loop,
        });
        Ok(())
    }

    /// Stops accepting and releases the port. Idempotent.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop.store(true, Ordering::SeqCst);
        if running.accept_loop.join().is_err() {
            warn!(target: LDAP_TARGET, "LDAP accept loop panicked");
        }
        debug!(target: LDAP_TARGET, address = %running.address, "LDAP double stopped");
    }

    /// `ldap://127.0.0.1:<port>` while running.
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.running
            .as_ref()
            .map(|running| format!("ldap://{}", running.address))
    }

    /// Bound address while running.
    #[must_use]
    pub fn address(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.address)
    }

    /// Returns `true` while accepting connections.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Connections accepted since construction.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Auth-method configuration pointing at this double, or `None` when
    /// stopped.
    #[must_use]
    pub fn auth_config(&self) -> Option<LdapConfig> {
        Some(LdapConfig {
            url: self.url()?,
            binddn: directory::BIND_DN.to_owned(),
            bindpass: directory::BIND_PASSWORD.to_owned(),
            userdn: directory::USERS_DN.to_owned(),
            userattr: directory::USER_ATTRIBUTE.to_owned(),
            groupdn: directory::GROUPS_DN.to_owned(),
            groupattr: directory::GROUP_ATTRIBUTE.to_owned(),
            insecure_tls: true,
        })
    }
}

impl Drop for MockLdapServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_accept_loop(
    listener: TcpListener,
    stop: Arc<AtomicBool>,
    connections: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    connections.fetch_add(1, Ordering::SeqCst);
                    debug!(target: LDAP_TARGET, %peer, "LDAP connection accepted");
                    drop(stream);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) => {
                    warn!(target: LDAP_TARGET, %error, "LDAP accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }
    })
}
