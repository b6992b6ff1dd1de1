//! Helpers for the LDAP auth method mounted at `ldap/`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, Method, VaultClient};

/// Connection settings written to `POST /v1/auth/ldap/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Directory URL, for example `ldap://127.0.0.1:10389`.
    pub url: String,
    /// DN used to bind for user searches.
    pub binddn: String,
    /// Password for `binddn`.
    pub bindpass: String,
    /// Base DN for user searches.
    pub userdn: String,
    /// Attribute holding the user name.
    pub userattr: String,
    /// Base DN for group searches.
    pub groupdn: String,
    /// Attribute holding the group name.
    pub groupattr: String,
    /// Skip TLS certificate verification.
    pub insecure_tls: bool,
}

/// Credential block returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginAuth {
    /// Issued client credential.
    pub client_token: String,
    /// Policies attached to the credential.
    #[serde(default)]
    pub policies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    auth: LoginAuth,
}

impl VaultClient {
    /// Writes the LDAP auth method configuration.
    pub fn configure_ldap(&self, config: &LdapConfig) -> Result<(), ClientError> {
        self.send(Method::Post, "/v1/auth/ldap/config", config)
    }

    /// Creates or updates an LDAP group mapping with the given policies.
    pub fn create_or_update_ldap_group(
        &self,
        name: &str,
        policies: &[&str],
    ) -> Result<(), ClientError> {
        let path = format!("/v1/auth/ldap/groups/{name}");
        self.send(Method::Post, &path, &json!({ "policies": policies.join(",") }))
    }

    /// Logs in through the LDAP auth method.
    ///
    /// The returned credential is not installed on the client.
    pub fn ldap_login(&self, username: &str, password: &str) -> Result<LoginAuth, ClientError> {
        let path = format!("/v1/auth/ldap/login/{username}");
        let response: LoginResponse =
            self.send_json(Method::Post, &path, &json!({ "password": password }))?;
        Ok(response.auth)
    }
}
