//! The `agent` and `check` commands.

use std::io::Write;

use tracing::info;
use vault_harness::client::ldap::LdapConfig;
use vault_harness::ldap::directory;
use vault_harness::{MockLdapServer, ServerManager, VaultClient};
use vault_harness_config::{Config, ConfigDirectory, names};

use crate::shutdown::ShutdownSignal;
use crate::{AppError, CLI_TARGET};

const LDAP_MOUNT: &str = "ldap";
const GROUP_POLICY: &str = "default";

fn tls_manager(config: &Config) -> Result<ServerManager, AppError> {
    let files = ConfigDirectory::from_config(config)?;
    let server_config = files.resolve(names::TLS_CONFIG)?;
    let trust = files.trust_bundle(config)?;
    let client = VaultClient::from_config_with_trust(config, &trust)?;
    Ok(ServerManager::new(config, vec![server_config], client)?)
}

fn bring_up(manager: &mut ServerManager) -> Result<(), AppError> {
    manager.start()?;
    manager.initialize()?;
    manager.unseal()?;
    Ok(())
}

/// Provisions a server with LDAP auth wired to the local double and blocks
/// until `shutdown` fires. Both the server and the double are stopped on every
/// path out.
pub(crate) fn run_agent<W: Write>(
    config: &Config,
    shutdown: &dyn ShutdownSignal,
    stdout: &mut W,
) -> Result<(), AppError> {
    let mut manager = tls_manager(config)?;
    let mut ldap = MockLdapServer::new();
    let result = provision(&mut manager, &mut ldap).and_then(|()| {
        let address = manager.client().base_url().to_string();
        info!(target: CLI_TARGET, address, "agent ready");
        writeln!(stdout, "vault ready at {address}").map_err(AppError::Output)?;
        stdout.flush().map_err(AppError::Output)?;
        Ok(shutdown.wait()?)
    });
    ldap.stop();
    manager.stop();
    result
}

fn provision(manager: &mut ServerManager, ldap: &mut MockLdapServer) -> Result<(), AppError> {
    bring_up(manager)?;
    manager.authenticate_root()?;
    ldap.start()?;
    let ldap_config: LdapConfig = ldap.auth_config().ok_or(AppError::LdapNotRunning)?;
    let client = manager.client();
    client.enable_auth_method(LDAP_MOUNT, LDAP_MOUNT)?;
    client.configure_ldap(&ldap_config)?;
    client.create_or_update_ldap_group(directory::GROUP_NAME, &[GROUP_POLICY])?;
    info!(
        target: CLI_TARGET,
        url = %ldap_config.url,
        group = directory::GROUP_NAME,
        "LDAP auth configured"
    );
    Ok(())
}

/// Starts, initializes and unseals a server, prints its seal status as JSON,
/// then stops it.
pub(crate) fn run_check<W: Write>(config: &Config, stdout: &mut W) -> Result<(), AppError> {
    let mut manager = tls_manager(config)?;
    let result = bring_up(&mut manager).and_then(|()| {
        let status = manager.seal_status()?;
        let rendered = serde_json::to_string(&status).map_err(AppError::SerialiseStatus)?;
        writeln!(stdout, "{rendered}").map_err(AppError::Output)
    });
    manager.stop();
    result
}
