//! Global setup for documentation examples.
//!
//! [`DoctestFixture::setup`] starts, initialises and unseals a server against
//! the `vault-doctest.hcl` configuration, attaches a pass-through
//! [`StubRegistry`] preloaded with the responses the examples rely on, and
//! returns everything the examples need as a [`DoctestEnvironment`] value.
//! Nothing is written to the process environment.

use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::info;
use vault_harness_config::{Config, ConfigDirectory, ConfigError, names};

use crate::client::{ClientError, VaultClient};
use crate::ldap::directory;
use crate::server::{ServerError, ServerManager};
use crate::stubs::{StubError, StubRegistry};

pub mod catalogue;

const DOCTEST_TARGET: &str = module_path!();

/// Lambda function name the AWS examples run under.
pub const AWS_LAMBDA_FUNCTION_NAME: &str = "hvac-lambda";
/// Access key id the AWS examples sign with.
pub const AWS_ACCESS_KEY_ID: &str = "foobar_key";
/// Secret key the AWS examples sign with.
pub const AWS_SECRET_ACCESS_KEY: &str = "foobar_secret";
/// Value the examples send in the request header.
pub const HEADER_VALUE: &str = "some_header_value";

/// Errors raised while preparing the documentation fixture.
#[derive(Debug, Error)]
pub enum DoctestError {
    /// A configuration file was missing or unreadable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The client could not be built.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// The server failed to start, initialise or unseal.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// A stub could not be registered.
    #[error(transparent)]
    Stub(#[from] StubError),
    /// A stub path could not be joined onto the service address.
    #[error("invalid stub path '{path}': {source}")]
    StubUrl {
        /// Path as supplied.
        path: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// A credential timestamp could not be formatted.
    #[error("failed to format credential timestamp: {source}")]
    Timestamp {
        /// Underlying formatting error.
        #[source]
        source: time::error::Format,
    },
    /// Initialisation finished without a root credential.
    #[error("server has no root token after initialization")]
    MissingRootToken,
}

/// Values the documentation examples read, in place of environment
/// variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoctestEnvironment {
    /// Root credential.
    pub vault_token: String,
    /// Service address.
    pub vault_addr: String,
    /// PEM bundle the fixture's own client trusts.
    pub ca_bundle: Utf8PathBuf,
    /// Seeded LDAP user.
    pub ldap_username: String,
    /// Password of the seeded LDAP user.
    pub ldap_password: String,
    /// Lambda function name for AWS examples.
    pub aws_lambda_function_name: String,
    /// AWS access key id.
    pub aws_access_key_id: String,
    /// AWS secret access key.
    pub aws_secret_access_key: String,
    /// Request header value.
    pub vault_header_value: String,
    /// Path of the GCP service-account key file.
    pub gcp_service_account_json_path: Utf8PathBuf,
    /// Contents of the GCP service-account key file.
    pub gcp_jwt_credentials: String,
}

impl DoctestEnvironment {
    /// Name/value pairs using the conventional variable names, for passing to
    /// a child process with `Command::envs`.
    #[must_use]
    pub fn vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("VAULT_TOKEN", self.vault_token.clone()),
            ("VAULT_ADDR", self.vault_addr.clone()),
            ("REQUESTS_CA_BUNDLE", self.ca_bundle.to_string()),
            ("LDAP_USERNAME", self.ldap_username.clone()),
            ("LDAP_PASSWORD", self.ldap_password.clone()),
            ("AWS_LAMBDA_FUNCTION_NAME", self.aws_lambda_function_name.clone()),
            ("AWS_ACCESS_KEY_ID", self.aws_access_key_id.clone()),
            ("AWS_SECRET_ACCESS_KEY", self.aws_secret_access_key.clone()),
            ("VAULT_HEADER_VALUE", self.vault_header_value.clone()),
            (
                "GCP_SERVICE_ACCOUNT_JSON_PATH",
                self.gcp_service_account_json_path.to_string(),
            ),
            ("GCP_JWT_CREDENTIALS", self.gcp_jwt_credentials.clone()),
        ]
    }
}

/// A running documentation fixture. Dropping it stops the server.
#[derive(Debug)]
pub struct DoctestSession {
    manager: ServerManager,
    stubs: Arc<StubRegistry>,
    environment: DoctestEnvironment,
}

impl DoctestSession {
    /// Manager owning the server.
    #[must_use]
    pub const fn manager(&self) -> &ServerManager {
        &self.manager
    }

    /// Mutable access to the manager, for explicit teardown.
    pub fn manager_mut(&mut self) -> &mut ServerManager {
        &mut self.manager
    }

    /// Root-authenticated client with the stub registry attached.
    #[must_use]
    pub const fn client(&self) -> &VaultClient {
        self.manager.client()
    }

    /// Registry shared with the client.
    #[must_use]
    pub const fn stubs(&self) -> &Arc<StubRegistry> {
        &self.stubs
    }

    /// Values the examples read.
    #[must_use]
    pub const fn environment(&self) -> &DoctestEnvironment {
        &self.environment
    }

    /// Stops the server.
    pub fn stop(&mut self) {
        self.manager.stop();
    }
}

/// Entry point for the documentation fixture.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoctestFixture;

impl DoctestFixture {
    /// Runs the global setup.
    ///
    /// Configuration files resolve against `config.config_dir`. The client
    /// trusts `config.ca_bundle`, or `server-cert.pem` when none is set. The
    /// server is stopped again if any later step fails.
    pub fn setup(config: &Config) -> Result<DoctestSession, DoctestError> {
        let files = ConfigDirectory::from_config(config)?;
        let server_config = files.resolve(names::DOCTEST_CONFIG)?;
        let ca_bundle = files.trust_bundle(config)?;
        let gcp_key_path = files.resolve(names::GCP_SERVICE_ACCOUNT)?;
        let gcp_credentials = files.read_to_string(names::GCP_SERVICE_ACCOUNT)?;

        let stubs = Arc::new(StubRegistry::passthrough());
        let client =
            VaultClient::from_config_with_trust(config, &ca_bundle)?.with_stubs(Arc::clone(&stubs));
        let mut manager = ServerManager::new(config, vec![server_config], client)?;
        manager.start()?;
        manager.initialize()?;
        manager.unseal()?;
        manager.authenticate_root()?;

        let root_token = manager
            .root_token()
            .ok_or(DoctestError::MissingRootToken)?
            .to_owned();
        catalogue::register(
            &stubs,
            manager.client().base_url(),
            &root_token,
            OffsetDateTime::now_utc(),
        )?;
        info!(
            target: DOCTEST_TARGET,
            stubs = stubs.len(),
            address = config.address(),
            "doctest fixture ready"
        );

        let environment = DoctestEnvironment {
            vault_token: root_token,
            vault_addr: config.address().to_owned(),
            ca_bundle,
            ldap_username: directory::USER_NAME.to_owned(),
            ldap_password: directory::USER_PASSWORD.to_owned(),
            aws_lambda_function_name: AWS_LAMBDA_FUNCTION_NAME.to_owned(),
            aws_access_key_id: AWS_ACCESS_KEY_ID.to_owned(),
            aws_secret_access_key: AWS_SECRET_ACCESS_KEY.to_owned(),
            vault_header_value: HEADER_VALUE.to_owned(),
            gcp_service_account_json_path: gcp_key_path,
            gcp_jwt_credentials: gcp_credentials,
        };
        Ok(DoctestSession {
            manager,
            stubs,
            environment,
        })
    }
}
