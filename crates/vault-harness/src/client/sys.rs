//! Typed records and helpers for the `/v1/sys` endpoints.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{ClientError, Method, VaultClient};

const INIT_PATH: &str = "/v1/sys/init";
const UNSEAL_PATH: &str = "/v1/sys/unseal";
const SEAL_STATUS_PATH: &str = "/v1/sys/seal-status";
const HEALTH_PATH: &str = "/v1/sys/health";

/// Body of `PUT /v1/sys/init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitRequest {
    /// Number of key shares to split the root key into.
    pub secret_shares: u8,
    /// Number of shares required to unseal.
    pub secret_threshold: u8,
}

/// Response of `PUT /v1/sys/init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitResponse {
    /// Initial root credential.
    pub root_token: String,
    /// Hex-encoded key shares.
    pub keys: Vec<String>,
    /// Base64-encoded key shares.
    #[serde(default)]
    pub keys_base64: Vec<String>,
}

/// Response of `GET /v1/sys/init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitStatus {
    /// Whether the service has been initialised.
    pub initialized: bool,
}

/// Body of `PUT /v1/sys/unseal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsealRequest {
    /// One key share.
    pub key: String,
}

/// Seal state as reported by `GET /v1/sys/seal-status` and
/// `PUT /v1/sys/unseal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealStatus {
    /// Whether the service is sealed.
    pub sealed: bool,
    /// Whether the service has been initialised.
    #[serde(default)]
    pub initialized: bool,
    /// Threshold of shares required.
    #[serde(default)]
    pub t: u8,
    /// Total number of shares.
    #[serde(default)]
    pub n: u8,
    /// Shares accepted towards the current unseal attempt.
    #[serde(default)]
    pub progress: u8,
}

/// Body of `GET /v1/sys/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the service has been initialised.
    pub initialized: bool,
    /// Whether the service is sealed.
    pub sealed: bool,
    /// Whether this node is a standby.
    #[serde(default)]
    pub standby: bool,
}

impl VaultClient {
    /// Reads `GET /v1/sys/init`.
    pub fn init_status(&self) -> Result<InitStatus, ClientError> {
        self.request_json(Method::Get, INIT_PATH, None)
    }

    /// Initialises the service with the given share parameters.
    pub fn initialize(&self, request: &InitRequest) -> Result<InitResponse, ClientError> {
        self.send_json(Method::Put, INIT_PATH, request)
    }

    /// Reads `GET /v1/sys/seal-status`.
    pub fn seal_status(&self) -> Result<SealStatus, ClientError> {
        self.request_json(Method::Get, SEAL_STATUS_PATH, None)
    }

    /// Submits one key share.
    pub fn submit_unseal_key(&self, key: &str) -> Result<SealStatus, ClientError> {
        let request = UnsealRequest {
            key: key.to_owned(),
        };
        self.send_json(Method::Put, UNSEAL_PATH, &request)
    }

    /// Reads `GET /v1/sys/health`.
    ///
    /// The endpoint encodes state in its status code (`503` when sealed,
    /// `501` when uninitialised), so every status with a decodable body is
    /// accepted.
    pub fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = self.url_for(HEALTH_PATH)?;
        let response = self.request_raw(Method::Get, HEALTH_PATH, None)?;
        let status = response.status();
        serde_json::from_value(response.into_body()).map_err(|source| {
            tracing::debug!(status, "health body did not decode");
            ClientError::Decode {
                url: url.to_string(),
                source,
            }
        })
    }

    /// Enables an auth method of `method_type` mounted at `path`.
    pub fn enable_auth_method(&self, method_type: &str, path: &str) -> Result<(), ClientError> {
        let route = format!("/v1/sys/auth/{}", path.trim_matches('/'));
        self.send(Method::Post, &route, &json!({ "type": method_type }))
    }
}
