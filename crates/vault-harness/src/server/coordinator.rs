//! Initialisation and unseal state machine.
//!
//! The coordinator drives a freshly started service through
//! `Uninitialized → Initializing → InitializedSealed → Unsealing → Unsealed`.
//! It talks to the service only through [`SystemBackend`], which keeps the
//! transition rules testable without a running server.

use std::fmt;

use tracing::{debug, info};
use vault_harness_config::ShareParameters;

use crate::client::sys::{InitRequest, InitResponse, InitStatus, SealStatus};
use crate::client::{ClientError, VaultClient};

use super::SERVER_TARGET;
use super::error::ServerError;

const ALREADY_INITIALIZED: &str = "already initialized";

/// Lifecycle state of a managed server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SealState {
    /// No init request has succeeded yet.
    Uninitialized,
    /// An init request is in flight.
    Initializing,
    /// Initialised; no shares submitted.
    InitializedSealed,
    /// Some shares have been accepted.
    Unsealing,
    /// The service reports `sealed: false`.
    Unsealed,
    /// The manager has been stopped.
    Stopped,
}

impl fmt::Display for SealState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::InitializedSealed => "initialized and sealed",
            Self::Unsealing => "unsealing",
            Self::Unsealed => "unsealed",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Key shares returned by initialisation, in the order the service issued
/// them, plus the declared threshold.
#[derive(Clone, PartialEq, Eq)]
pub struct UnsealKeys {
    keys: Vec<String>,
    threshold: u8,
}

impl UnsealKeys {
    /// Wraps shares and their threshold.
    #[must_use]
    pub const fn new(keys: Vec<String>, threshold: u8) -> Self {
        Self { keys, threshold }
    }

    /// All shares.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Shares required to unseal.
    #[must_use]
    pub const fn threshold(&self) -> u8 {
        self.threshold
    }

    /// Number of shares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` when no shares are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl fmt::Debug for UnsealKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealKeys")
            .field("keys", &format_args!("<{} redacted>", self.keys.len()))
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// System endpoints the coordinator depends on.
#[cfg_attr(test, mockall::automock)]
pub trait SystemBackend {
    /// Reads whether the service has been initialised.
    fn init_status(&self) -> Result<InitStatus, ClientError>;
    /// Initialises the service.
    fn initialize(&self, request: &InitRequest) -> Result<InitResponse, ClientError>;
    /// Reads the current seal state.
    fn seal_status(&self) -> Result<SealStatus, ClientError>;
    /// Submits one key share.
    fn submit_unseal_key(&self, key: &str) -> Result<SealStatus, ClientError>;
}

impl SystemBackend for VaultClient {
    fn init_status(&self) -> Result<InitStatus, ClientError> {
        Self::init_status(self)
    }

    fn initialize(&self, request: &InitRequest) -> Result<InitResponse, ClientError> {
        Self::initialize(self, request)
    }

    fn seal_status(&self) -> Result<SealStatus, ClientError> {
        Self::seal_status(self)
    }

    fn submit_unseal_key(&self, key: &str) -> Result<SealStatus, ClientError> {
        Self::submit_unseal_key(self, key)
    }
}

#[derive(Debug)]
pub(crate) struct Coordinator {
    state: SealState,
    shares: ShareParameters,
    root_token: Option<String>,
    keys: Option<UnsealKeys>,
    accepted: usize,
}

impl Coordinator {
    pub(crate) const fn new(shares: ShareParameters) -> Self {
        Self {
            state: SealState::Uninitialized,
            shares,
            root_token: None,
            keys: None,
            accepted: 0,
        }
    }

    pub(crate) const fn state(&self) -> SealState {
        self.state
    }

    pub(crate) fn root_token(&self) -> Option<&str> {
        self.root_token.as_deref()
    }

    pub(crate) const fn unseal_keys(&self) -> Option<&UnsealKeys> {
        self.keys.as_ref()
    }

    pub(crate) fn mark_stopped(&mut self) {
        self.state = SealState::Stopped;
    }

    /// Initialises the service once. Any failure returns the state to
    /// `Uninitialized`.
    pub(crate) fn initialize(&mut self, backend: &dyn SystemBackend) -> Result<(), ServerError> {
        match self.state {
            SealState::Uninitialized => {}
            SealState::InitializedSealed | SealState::Unsealing | SealState::Unsealed => {
                return Err(ServerError::AlreadyInitialized);
            }
            SealState::Stopped => return Err(ServerError::Stopped),
            state @ SealState::Initializing => {
                return Err(ServerError::InvalidState {
                    operation: "initialize",
                    state,
                });
            }
        }

        self.state = SealState::Initializing;
        match self.request_init(backend) {
            Ok(response) => {
                info!(
                    target: SERVER_TARGET,
                    shares = response.keys.len(),
                    threshold = self.shares.threshold(),
                    "server initialized"
                );
                self.root_token = Some(response.root_token);
                self.keys = Some(UnsealKeys::new(response.keys, self.shares.threshold()));
                self.accepted = 0;
                self.state = SealState::InitializedSealed;
                Ok(())
            }
            Err(error) => {
                self.state = SealState::Uninitialized;
                Err(error)
            }
        }
    }

    fn request_init(&self, backend: &dyn SystemBackend) -> Result<InitResponse, ServerError> {
        if backend.init_status()?.initialized {
            return Err(ServerError::AlreadyInitialized);
        }
        let request = InitRequest {
            secret_shares: self.shares.shares(),
            secret_threshold: self.shares.threshold(),
        };
        let response = backend.initialize(&request).map_err(|error| match error {
            ClientError::Api { status: 400, ref body } if body.contains(ALREADY_INITIALIZED) => {
                ServerError::AlreadyInitialized
            }
            other => ServerError::Client(other),
        })?;

        if response.root_token.is_empty() {
            return Err(ServerError::MalformedInit {
                reason: String::from("empty root token"),
            });
        }
        if response.keys.len() < usize::from(self.shares.threshold()) {
            return Err(ServerError::MalformedInit {
                reason: format!(
                    "{} shares returned for threshold {}",
                    response.keys.len(),
                    self.shares.threshold()
                ),
            });
        }
        Ok(response)
    }

    /// Submits shares until the service reports unsealed.
    ///
    /// Shares go one at a time in issued order, resuming after the last one
    /// the service accepted. A rejected share is never followed by the next.
    pub(crate) fn unseal(&mut self, backend: &dyn SystemBackend) -> Result<(), ServerError> {
        match self.state {
            SealState::InitializedSealed | SealState::Unsealing => {}
            SealState::Unsealed => return Ok(()),
            SealState::Stopped => return Err(ServerError::Stopped),
            state @ (SealState::Uninitialized | SealState::Initializing) => {
                return Err(ServerError::InvalidState {
                    operation: "unseal",
                    state,
                });
            }
        }
        let Some(keys) = self.keys.clone() else {
            return Err(ServerError::InvalidState {
                operation: "unseal",
                state: self.state,
            });
        };

        let current = backend.seal_status()?;
        if !current.sealed {
            debug!(target: SERVER_TARGET, "server already unsealed");
            self.finish_unseal();
            return Ok(());
        }
        if current.progress == 0 {
            self.accepted = 0;
        }
        self.state = SealState::Unsealing;

        let threshold = usize::from(keys.threshold());
        while self.accepted < threshold {
            let index = self.accepted;
            let Some(key) = keys.keys().get(index) else {
                break;
            };
            let status = match backend.submit_unseal_key(key) {
                Ok(status) => status,
                Err(ClientError::Api { status: 400, body }) => {
                    return Err(ServerError::UnsealShareRejected {
                        index,
                        status: 400,
                        body,
                    });
                }
                Err(other) => return Err(other.into()),
            };
            self.accepted += 1;
            debug!(
                target: SERVER_TARGET,
                index,
                progress = status.progress,
                sealed = status.sealed,
                "unseal share accepted"
            );
            if !status.sealed {
                info!(target: SERVER_TARGET, shares = self.accepted, "server unsealed");
                self.finish_unseal();
                return Ok(());
            }
        }
        Err(ServerError::StillSealed {
            submitted: self.accepted,
            threshold,
        })
    }

    fn finish_unseal(&mut self) {
        self.state = SealState::Unsealed;
        self.accepted = 0;
    }
}
