//! TCP reachability checks for the service listener.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use url::Url;

use super::error::ServerError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Host and port the service is expected to listen on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenAddress {
    host: String,
    port: u16,
}

impl ListenAddress {
    /// Builds a listen address from parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Derives the listen address from the client's base URL, using the
    /// scheme's default port when none is given.
    pub fn from_url(url: &Url) -> Result<Self, ServerError> {
        let host = url
            .host_str()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'));
        match (host, url.port_or_known_default()) {
            (Some(host), Some(port)) => Ok(Self::new(host, port)),
            _ => Err(ServerError::Address {
                address: url.to_string(),
            }),
        }
    }

    /// Host name or IP literal.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ListenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Checks whether something accepts connections at `address`.
///
/// "Not listening" errors map to `Ok(false)`; anything else is surfaced.
pub(crate) fn is_listening(address: &ListenAddress) -> Result<bool, ServerError> {
    reachability(try_connect(address)).map_err(|source| ServerError::Connect {
        address: address.to_string(),
        source,
    })
}

fn reachability(outcome: io::Result<()>) -> io::Result<bool> {
    match outcome {
        Ok(()) => Ok(true),
        // Only a peer that accepted the connection can reset it.
        Err(error) if error.kind() == io::ErrorKind::ConnectionReset => Ok(true),
        Err(error) if is_not_listening(&error) => Ok(false),
        Err(error) => Err(error),
    }
}

fn try_connect(address: &ListenAddress) -> io::Result<()> {
    let resolved = resolve(address)?;
    TcpStream::connect_timeout(&resolved, CONNECT_TIMEOUT).map(|_| ())
}

fn resolve(address: &ListenAddress) -> io::Result<SocketAddr> {
    (address.host.as_str(), address.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved address"))
}

/// A timed-out attempt counts as "not yet"; the startup deadline bounds it.
fn is_not_listening(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::NotFound
            | io::ErrorKind::AddrNotAvailable
            | io::ErrorKind::TimedOut
    )
}
