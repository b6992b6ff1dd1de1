//! Default values shared by the configuration loader and its callers.

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Address the service listens on in the bundled TLS configuration files.
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

/// Service binary looked up on `PATH` when no override is configured.
pub const DEFAULT_SERVER_BINARY: &str = "vault";

/// Directory holding the service configuration files and TLS material.
pub const DEFAULT_CONFIG_DIR: &str = "tests/config_files";

/// Number of unseal key shares requested at initialization.
pub const DEFAULT_SECRET_SHARES: u8 = 5;

/// Number of key shares required to unseal.
pub const DEFAULT_SECRET_THRESHOLD: u8 = 3;

/// Overall readiness deadline, in milliseconds.
pub const DEFAULT_STARTUP_TIMEOUT_MS: u64 = 10_000;

/// Delay between readiness checks, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Time a terminated server is given to exit before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5_000;

/// Per-request timeout applied by the client handle.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default log filter expression.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Owned default address, used where serde or the loader need a `String`.
#[must_use]
pub fn default_address() -> String {
    DEFAULT_ADDRESS.to_owned()
}

/// Owned default server binary name.
#[must_use]
pub fn default_server_binary() -> String {
    DEFAULT_SERVER_BINARY.to_owned()
}

/// Arguments placed before the `-config=` flags when launching the server.
#[must_use]
pub fn default_server_arguments() -> Vec<String> {
    vec![String::from("server")]
}

/// Default configuration directory.
#[must_use]
pub fn default_config_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CONFIG_DIR)
}

/// Owned log filter value used where allocation is required.
#[must_use]
pub fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

#[must_use]
pub(crate) const fn default_secret_shares() -> u8 {
    DEFAULT_SECRET_SHARES
}

#[must_use]
pub(crate) const fn default_secret_threshold() -> u8 {
    DEFAULT_SECRET_THRESHOLD
}

#[must_use]
pub(crate) const fn default_startup_timeout_ms() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_MS
}

#[must_use]
pub(crate) const fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[must_use]
pub(crate) const fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}

#[must_use]
pub(crate) const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
