//! Blocking client handle for the service API.
//!
//! [`VaultClient`] wraps a `reqwest` blocking client configured with the
//! service base address and trust bundle. It holds a single bearer credential
//! slot: requests issued while the slot is empty are unauthenticated, and
//! setting it affects only later requests. When a [`StubRegistry`] is attached
//! it is consulted before every request.
//!
//! Typed helpers for the system endpoints live in [`sys`] and for the LDAP
//! auth method in [`ldap`].

use std::fs;
use std::sync::Arc;

use camino::Utf8Path;
use reqwest::blocking::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;
use vault_harness_config::Config;

use crate::stubs::{StubMode, StubRegistry};

mod error;
pub mod ldap;
mod method;
pub mod sys;

pub use error::ClientError;
pub use method::{Method, UnknownMethod};

const CLIENT_TARGET: &str = module_path!();
const TOKEN_HEADER: &str = "X-Vault-Token";
const REQUEST_HEADER: &str = "X-Vault-Request";

/// Status code, parsed JSON body and raw text of a response.
///
/// Empty bodies (for example `204 No Content`) parse to [`Value::Null`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: u16,
    body: Value,
    raw: String,
}

impl Response {
    /// Builds a response whose raw text is rendered from `body`.
    pub(crate) fn new(status: u16, body: Value) -> Self {
        let raw = match &body {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        Self { status, body, raw }
    }

    pub(crate) const fn with_raw(status: u16, body: Value, raw: String) -> Self {
        Self { status, body, raw }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Parsed body.
    #[must_use]
    pub const fn body(&self) -> &Value {
        &self.body
    }

    /// Consumes the response, returning the body.
    #[must_use]
    pub fn into_body(self) -> Value {
        self.body
    }

    /// Body text exactly as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Returns `true` for 2xx status codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    fn into_result(self) -> Result<Value, ClientError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(ClientError::Api {
                status: self.status,
                body: self.raw,
            })
        }
    }
}

/// Request-issuing handle bound to one service address.
#[derive(Debug, Clone)]
pub struct VaultClient {
    base_url: Url,
    http: Client,
    token: Option<String>,
    request_header: Option<String>,
    stubs: Option<Arc<StubRegistry>>,
}

impl VaultClient {
    /// Builds a client from the harness configuration.
    ///
    /// The trust bundle, when configured, is added as a root certificate.
    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::build(config, config.ca_bundle())
    }

    /// Builds a client that trusts `bundle` in place of any configured one.
    ///
    /// Pair with [`ConfigDirectory::trust_bundle`] to trust the server
    /// certificate shipped next to the service configuration.
    ///
    /// [`ConfigDirectory::trust_bundle`]: vault_harness_config::ConfigDirectory::trust_bundle
    pub fn from_config_with_trust(config: &Config, bundle: &Utf8Path) -> Result<Self, ClientError> {
        Self::build(config, Some(bundle))
    }

    fn build(config: &Config, bundle: Option<&Utf8Path>) -> Result<Self, ClientError> {
        let base_url = parse_base_url(config.address())?;
        let mut builder = Client::builder().timeout(config.request_timeout());
        if let Some(path) = bundle {
            debug!(target: CLIENT_TARGET, bundle = %path, "trusting certificate bundle");
            builder = builder.add_root_certificate(load_certificate(path)?);
        }
        let http = builder
            .build()
            .map_err(|source| ClientError::Build { source })?;
        Ok(Self {
            base_url,
            http,
            token: None,
            request_header: config.request_header().map(str::to_owned),
            stubs: None,
        })
    }

    /// Builds an unauthenticated client with default transport settings.
    pub fn new(address: &str) -> Result<Self, ClientError> {
        let config = Config {
            address: address.to_owned(),
            ..Config::default()
        };
        Self::from_config(&config)
    }

    /// Attaches a stub registry consulted before every request.
    #[must_use]
    pub fn with_stubs(mut self, stubs: Arc<StubRegistry>) -> Self {
        self.stubs = Some(stubs);
        self
    }

    /// The attached stub registry, if any.
    #[must_use]
    pub fn stubs(&self) -> Option<&Arc<StubRegistry>> {
        self.stubs.as_ref()
    }

    /// Base address of the service.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Current bearer credential.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Sets the bearer credential used by subsequent requests.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    /// Clears the bearer credential.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Resolves an API path (for example `/v1/sys/init`) against the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| ClientError::InvalidPath {
                path: path.to_owned(),
                source,
            })
    }

    /// Issues a request and returns the parsed body of a 2xx response.
    ///
    /// Non-success statuses fail with [`ClientError::Api`] carrying the status
    /// and raw body.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Value, ClientError> {
        self.request_raw(method, path, payload)?.into_result()
    }

    /// Issues a request and deserialises the body of a 2xx response.
    pub fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<T, ClientError> {
        let url = self.url_for(path)?;
        let body = self.request(method, path, payload)?;
        serde_json::from_value(body).map_err(|source| ClientError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// Serialises `body` and issues the request, deserialising the response.
    pub fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = encode(path, body)?;
        self.request_json(method, path, Some(&payload))
    }

    /// Serialises `body` and issues the request, discarding the response body.
    pub fn send(&self, method: Method, path: &str, body: &impl Serialize) -> Result<(), ClientError> {
        let payload = encode(path, body)?;
        self.request(method, path, Some(&payload)).map(|_| ())
    }

    /// Issues a request and returns the response whatever its status.
    pub fn request_raw(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
    ) -> Result<Response, ClientError> {
        let url = self.url_for(path)?;
        self.execute(method, url, payload)
    }

    fn execute(
        &self,
        method: Method,
        url: Url,
        payload: Option<&Value>,
    ) -> Result<Response, ClientError> {
        if let Some(stubs) = &self.stubs {
            if let Some(stub) = stubs.respond(method, &url) {
                return Ok(stub.to_response());
            }
            if stubs.mode() == StubMode::Strict {
                return Err(ClientError::Unstubbed {
                    method,
                    url: url.to_string(),
                });
            }
        }

        let wire_method = method
            .to_reqwest()
            .ok_or(ClientError::UnsupportedMethod { method })?;
        let mut request = self.http.request(wire_method, url.clone());
        if let Some(token) = &self.token {
            request = request.header(TOKEN_HEADER, token);
        }
        if let Some(value) = &self.request_header {
            request = request.header(REQUEST_HEADER, value);
        }
        if let Some(body) = payload {
            request = request.json(body);
        }

        debug!(
            target: CLIENT_TARGET,
            %method,
            url = %url,
            authenticated = self.token.is_some(),
            "sending request"
        );
        let transport_error = |source| ClientError::Transport {
            method,
            url: url.to_string(),
            source,
        };
        let response = request.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(transport_error)?;
        debug!(target: CLIENT_TARGET, %method, url = %url, status, "received response");

        let body = if (200..300).contains(&status) {
            parse_body(&url, &text)?
        } else {
            parse_body(&url, &text).unwrap_or_else(|_| Value::String(text.clone()))
        };
        Ok(Response::with_raw(status, body, text))
    }
}

fn parse_base_url(address: &str) -> Result<Url, ClientError> {
    let mut url = Url::parse(address).map_err(|source| ClientError::InvalidAddress {
        address: address.to_owned(),
        source,
    })?;
    // `Url::join` replaces the last segment unless the path ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn load_certificate(path: &Utf8Path) -> Result<reqwest::Certificate, ClientError> {
    let pem = fs::read(path).map_err(|source| ClientError::TrustBundle {
        path: path.to_path_buf(),
        source,
    })?;
    reqwest::Certificate::from_pem(&pem).map_err(|source| ClientError::Certificate {
        path: path.to_path_buf(),
        source,
    })
}

fn encode(path: &str, body: &(impl Serialize + ?Sized)) -> Result<Value, ClientError> {
    serde_json::to_value(body).map_err(|source| ClientError::Encode {
        path: path.to_owned(),
        source,
    })
}

fn parse_body(url: &Url, text: &str) -> Result<Value, ClientError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|source| ClientError::Decode {
        url: url.to_string(),
        source,
    })
}
