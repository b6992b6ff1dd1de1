//! Shared configuration for the vault test harness.
//!
//! Every knob the harness needs (service address, trust bundle, launch
//! command, secret-sharing parameters, timing budgets and logging) lives on
//! the explicit [`Config`] struct. Values are layered by `ortho_config`:
//! built-in defaults, then an optional TOML file passed with `--config-path`,
//! then `VAULT_HARNESS_*` environment variables, then command-line flags.
//! Nothing else in the workspace reads the process environment; callers load
//! a [`Config`] once and hand it to constructors.
//!
//! [`ConfigDirectory`] resolves the named service configuration files (for
//! example `vault-tls.hcl`) relative to [`Config::config_dir`].

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod files;
mod logging;

pub use defaults::{
    DEFAULT_ADDRESS, DEFAULT_CONFIG_DIR, DEFAULT_LOG_FILTER, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SECRET_SHARES, DEFAULT_SECRET_THRESHOLD,
    DEFAULT_SERVER_BINARY, DEFAULT_SHUTDOWN_GRACE_MS, DEFAULT_STARTUP_TIMEOUT_MS,
    default_address, default_config_dir, default_log_filter, default_log_format,
    default_server_arguments, default_server_binary,
};
pub use files::{ConfigDirectory, ConfigError, names};
pub use logging::{LogFormat, LogFormatParseError};

use defaults::{
    default_poll_interval_ms, default_request_timeout_ms, default_secret_shares,
    default_secret_threshold, default_shutdown_grace_ms, default_startup_timeout_ms,
};

/// Harness configuration shared by the library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VAULT_HARNESS")]
pub struct Config {
    /// Base address of the service API, for example `https://127.0.0.1:8200`.
    #[serde(default = "default_address")]
    #[ortho_config(default = default_address())]
    pub address: String,
    /// PEM bundle trusted when talking to the service over TLS.
    #[serde(default)]
    pub ca_bundle: Option<Utf8PathBuf>,
    /// Directory containing the service configuration files.
    #[serde(default = "default_config_dir")]
    #[ortho_config(default = default_config_dir())]
    pub config_dir: Utf8PathBuf,
    /// Service binary to launch.
    #[serde(default = "default_server_binary")]
    #[ortho_config(default = default_server_binary())]
    pub server_binary: String,
    /// Arguments passed before the `-config=` flags.
    #[serde(default = "default_server_arguments")]
    #[ortho_config(default = default_server_arguments())]
    pub server_arguments: Vec<String>,
    /// Number of key shares requested at initialization.
    #[serde(default = "default_secret_shares")]
    #[ortho_config(default = default_secret_shares())]
    pub secret_shares: u8,
    /// Number of shares required to unseal.
    #[serde(default = "default_secret_threshold")]
    #[ortho_config(default = default_secret_threshold())]
    pub secret_threshold: u8,
    /// Readiness deadline in milliseconds.
    #[serde(default = "default_startup_timeout_ms")]
    #[ortho_config(default = default_startup_timeout_ms())]
    pub startup_timeout_ms: u64,
    /// Delay between readiness checks in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    #[ortho_config(default = default_poll_interval_ms())]
    pub poll_interval_ms: u64,
    /// Grace period between SIGTERM and SIGKILL in milliseconds.
    #[serde(default = "default_shutdown_grace_ms")]
    #[ortho_config(default = default_shutdown_grace_ms())]
    pub shutdown_grace_ms: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    #[ortho_config(default = default_request_timeout_ms())]
    pub request_timeout_ms: u64,
    /// Optional value sent as the `X-Vault-Request` header.
    #[serde(default)]
    pub request_header: Option<String>,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter")]
    #[ortho_config(default = default_log_filter())]
    pub log_filter: String,
    /// Tracing output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            ca_bundle: None,
            config_dir: default_config_dir(),
            server_binary: default_server_binary(),
            server_arguments: default_server_arguments(),
            secret_shares: default_secret_shares(),
            secret_threshold: default_secret_threshold(),
            startup_timeout_ms: default_startup_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            request_header: None,
            log_filter: default_log_filter(),
            log_format: default_log_format(),
        }
    }
}

/// Validated secret-sharing parameters used when initializing the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareParameters {
    shares: u8,
    threshold: u8,
}

impl ShareParameters {
    /// Builds parameters, enforcing `1 <= threshold <= shares`.
    pub const fn new(shares: u8, threshold: u8) -> Result<Self, ConfigError> {
        if threshold == 0 || threshold > shares {
            return Err(ConfigError::InvalidShares { shares, threshold });
        }
        Ok(Self { shares, threshold })
    }

    /// Total number of key shares.
    #[must_use]
    pub const fn shares(self) -> u8 {
        self.shares
    }

    /// Shares required to reconstruct the master key.
    #[must_use]
    pub const fn threshold(self) -> u8 {
        self.threshold
    }
}

impl Config {
    /// Base address of the service API.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Trust bundle path, if one is configured.
    #[must_use]
    pub fn ca_bundle(&self) -> Option<&Utf8Path> {
        self.ca_bundle.as_deref()
    }

    /// Directory holding the service configuration files.
    #[must_use]
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Service binary to launch.
    #[must_use]
    pub fn server_binary(&self) -> &str {
        &self.server_binary
    }

    /// Arguments passed ahead of the configuration flags.
    #[must_use]
    pub fn server_arguments(&self) -> &[String] {
        &self.server_arguments
    }

    /// Validated secret-sharing parameters.
    pub const fn share_parameters(&self) -> Result<ShareParameters, ConfigError> {
        ShareParameters::new(self.secret_shares, self.secret_threshold)
    }

    /// Readiness deadline.
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    /// Delay between readiness checks.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Grace period granted to the server between SIGTERM and SIGKILL.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Per-request timeout for the client handle.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Optional `X-Vault-Request` header value.
    #[must_use]
    pub fn request_header(&self) -> Option<&str> {
        self.request_header.as_deref()
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Tracing output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
