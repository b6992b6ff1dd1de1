//! Error type for the CLI runtime.

use std::io;
use std::sync::Arc;

use thiserror::Error;
use vault_harness::{ClientError, LdapError, ServerError, TelemetryError};
use vault_harness_config::ConfigError;

use crate::shutdown::ShutdownError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Server(#[from] ServerError),
    #[error(transparent)]
    Ldap(#[from] LdapError),
    #[error("LDAP double stopped before it could be configured")]
    LdapNotRunning,
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
    #[error("failed to serialise seal status: {0}")]
    SerialiseStatus(serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(io::Error),
}
