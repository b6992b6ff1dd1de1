//! Resolves named service configuration files on disk.
//!
//! The harness ships a directory of service configuration files and TLS
//! material. Tests refer to them by file name; [`ConfigDirectory`] turns a
//! name into an absolute path after confirming the file exists, so a typo
//! fails at lookup time instead of surfacing later as an opaque launch error.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use thiserror::Error;

use crate::Config;

/// Well-known file names inside the configuration directory.
pub mod names {
    /// Service configuration used by the documentation examples.
    pub const DOCTEST_CONFIG: &str = "vault-doctest.hcl";
    /// TLS-enabled service configuration used by the agent scenario.
    pub const TLS_CONFIG: &str = "vault-tls.hcl";
    /// Certificate the service presents; trusted by the client handle.
    pub const SERVER_CERT: &str = "server-cert.pem";
    /// Service-account credentials consumed by the GCP examples.
    pub const GCP_SERVICE_ACCOUNT: &str = "example.jwt.json";
}

/// Errors raised while validating configuration or locating files.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Secret-sharing parameters violate `1 <= threshold <= shares`.
    #[error("invalid secret sharing parameters: {threshold} of {shares} shares")]
    InvalidShares {
        /// Configured share count.
        shares: u8,
        /// Configured threshold.
        threshold: u8,
    },
    /// The configuration directory could not be opened.
    #[error("failed to open configuration directory {path}: {source}")]
    OpenDirectory {
        /// Directory that was requested.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The named file does not exist in the configuration directory.
    #[error("configuration file '{name}' not found in {directory}")]
    MissingFile {
        /// Requested file name.
        name: String,
        /// Directory searched.
        directory: Utf8PathBuf,
    },
    /// The name resolved to something other than a regular file.
    #[error("configuration entry '{name}' in {directory} is not a regular file")]
    NotAFile {
        /// Requested file name.
        name: String,
        /// Directory searched.
        directory: Utf8PathBuf,
    },
    /// Reading or inspecting a configuration file failed.
    #[error("failed to read configuration file '{name}': {source}")]
    Read {
        /// Requested file name.
        name: String,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Capability handle over the directory that holds service configuration.
#[derive(Debug)]
pub struct ConfigDirectory {
    root: Utf8PathBuf,
    dir: Dir,
}

impl ConfigDirectory {
    /// Opens `root`, canonicalising it so resolved paths are absolute.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, ConfigError> {
        let requested = root.as_ref();
        let root = requested
            .canonicalize_utf8()
            .map_err(|source| ConfigError::OpenDirectory {
                path: requested.to_path_buf(),
                source,
            })?;
        let dir = Dir::open_ambient_dir(root.as_std_path(), ambient_authority()).map_err(
            |source| ConfigError::OpenDirectory {
                path: root.clone(),
                source,
            },
        )?;
        Ok(Self { root, dir })
    }

    /// Opens the directory named by [`Config::config_dir`].
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::open(config.config_dir())
    }

    /// Absolute path of the directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolves `name` to an absolute path, failing when no such file exists.
    pub fn resolve(&self, name: &str) -> Result<Utf8PathBuf, ConfigError> {
        match self.dir.metadata(name) {
            Ok(metadata) if metadata.is_file() => Ok(self.root.join(name)),
            Ok(_) => Err(ConfigError::NotAFile {
                name: name.to_owned(),
                directory: self.root.clone(),
            }),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                Err(ConfigError::MissingFile {
                    name: name.to_owned(),
                    directory: self.root.clone(),
                })
            }
            Err(source) => Err(ConfigError::Read {
                name: name.to_owned(),
                source,
            }),
        }
    }

    /// Trust bundle for the service certificate.
    ///
    /// An explicitly configured bundle wins; otherwise `server-cert.pem` in
    /// this directory is used.
    pub fn trust_bundle(&self, config: &Config) -> Result<Utf8PathBuf, ConfigError> {
        match config.ca_bundle() {
            Some(path) => Ok(path.to_path_buf()),
            None => self.resolve(names::SERVER_CERT),
        }
    }

    /// Resolves several names, preserving their order.
    pub fn resolve_all<'a, I>(&self, names: I) -> Result<Vec<Utf8PathBuf>, ConfigError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().map(|name| self.resolve(name)).collect()
    }

    /// Reads a configuration file as UTF-8 text.
    pub fn read_to_string(&self, name: &str) -> Result<String, ConfigError> {
        self.resolve(name)?;
        self.dir
            .read_to_string(name)
            .map_err(|source| ConfigError::Read {
                name: name.to_owned(),
                source,
            })
    }
}
