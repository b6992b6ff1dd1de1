//! Shared fixtures for lifecycle tests.
//!
//! The "server process" in these tests is `sh -c 'exec sleep 30'`: it gives
//! the manager a real child to supervise and signal, while the HTTP side is
//! answered by [`FakeVault`] on the address the client is configured with.

mod fake_vault;

use std::cell::RefCell;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use rstest::fixture;
use tempfile::TempDir;
use vault_harness_config::{Config, names};

use crate::client::ldap::LoginAuth;
use crate::server::{ServerError, ServerManager};
use crate::stubs::StubRegistry;
use crate::VaultClient;

pub(super) use fake_vault::{FakeVault, ROOT_TOKEN};

/// Self-signed certificate for `localhost` / `127.0.0.1`.
pub(super) const SERVER_CERT_PEM: &str = include_str!("../../../tests/fixtures/server-cert.pem");

/// A fake service plus a configuration directory pointing at it.
pub(super) struct Harness {
    pub vault: FakeVault,
    pub config: Config,
    _config_dir: TempDir,
}

impl Harness {
    pub fn new() -> Result<Self> {
        let vault = FakeVault::spawn()?;
        let config_dir = TempDir::new().context("config dir")?;
        for (name, contents) in [
            (names::DOCTEST_CONFIG, "listener \"tcp\" {}\n"),
            (names::TLS_CONFIG, "listener \"tcp\" {}\n"),
            (names::SERVER_CERT, SERVER_CERT_PEM),
            (names::GCP_SERVICE_ACCOUNT, "{\"type\": \"service_account\"}\n"),
        ] {
            fs::write(config_dir.path().join(name), contents)
                .with_context(|| format!("write {name}"))?;
        }
        let root = Utf8PathBuf::from_path_buf(config_dir.path().to_path_buf())
            .map_err(|path| anyhow::anyhow!("non-UTF-8 temp dir {}", path.display()))?;
        let config = Config {
            address: vault.address(),
            config_dir: root,
            server_binary: String::from("sh"),
            server_arguments: vec![
                String::from("-c"),
                String::from("exec sleep 30"),
                String::from("fake-vault"),
            ],
            startup_timeout_ms: 5_000,
            poll_interval_ms: 20,
            shutdown_grace_ms: 2_000,
            ..Config::default()
        };
        Ok(Self {
            vault,
            config,
            _config_dir: config_dir,
        })
    }

    pub fn client(&self) -> Result<VaultClient> {
        VaultClient::from_config(&self.config).context("build client")
    }

    pub fn config_path(&self, name: &str) -> Utf8PathBuf {
        self.config.config_dir.join(name)
    }

    /// Manager for `vault-tls.hcl`, not yet started.
    pub fn manager(&self) -> Result<ServerManager> {
        self.manager_with_client(self.client()?)
    }

    pub fn manager_with_client(&self, client: VaultClient) -> Result<ServerManager> {
        ServerManager::new(
            &self.config,
            vec![self.config_path(names::TLS_CONFIG)],
            client,
        )
        .context("build manager")
    }

    /// Manager that has been started.
    pub fn started_manager(&self) -> Result<ServerManager> {
        let mut manager = self.manager()?;
        manager.start().context("start manager")?;
        Ok(manager)
    }
}

/// Mutable state shared between BDD steps.
#[derive(Default)]
pub(super) struct TestWorld {
    pub harness: Option<Harness>,
    pub manager: Option<ServerManager>,
    pub stubs: Option<Arc<StubRegistry>>,
    pub error: Option<ServerError>,
    pub rejection: Option<crate::ClientError>,
    pub login: Option<LoginAuth>,
}

impl TestWorld {
    pub fn harness(&self) -> Result<&Harness> {
        self.harness.as_ref().context("fake service not running")
    }

    pub fn manager_mut(&mut self) -> Result<&mut ServerManager> {
        self.manager.as_mut().context("manager not created")
    }

    pub fn manager(&self) -> Result<&ServerManager> {
        self.manager.as_ref().context("manager not created")
    }
}

#[fixture]
pub(super) fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::default())
}
