//! Canned responses keyed by request method and exact URL.
//!
//! The registry is attached to a [`VaultClient`](crate::VaultClient) and
//! consulted before any request reaches the network. In pass-through mode an
//! unmatched request continues to the real service; in strict mode it fails
//! with [`ClientError::Unstubbed`](crate::ClientError::Unstubbed).
//!
//! Keys are normalised through [`Url`], so an upper-case scheme or an explicit
//! default port in a registration still matches the client's request URL.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::{Method, Response};

const STUB_TARGET: &str = module_path!();

/// Errors raised while registering stubs.
#[derive(Debug, Error)]
pub enum StubError {
    /// The URL could not be parsed.
    #[error("invalid stub url '{url}': {source}")]
    InvalidUrl {
        /// URL as supplied.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
}

/// How the registry treats requests with no registered response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StubMode {
    /// Unmatched requests go to the network.
    #[default]
    Passthrough,
    /// Unmatched requests fail.
    Strict,
}

/// Canned status and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct StubResponse {
    status: u16,
    body: Option<Value>,
}

impl StubResponse {
    /// `200 OK` with a JSON body.
    #[must_use]
    pub const fn json(body: Value) -> Self {
        Self {
            status: 200,
            body: Some(body),
        }
    }

    /// `200 OK` with an empty body.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            status: 200,
            body: None,
        }
    }

    /// Replaces the status code.
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Status code served for this stub.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// JSON body served for this stub, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub(crate) fn to_response(&self) -> Response {
        Response::new(self.status, self.body.clone().unwrap_or(Value::Null))
    }
}

#[derive(Debug)]
struct StubEntry {
    response: StubResponse,
    hits: usize,
}

type StubKey = (Method, String);

/// Registry of canned responses.
#[derive(Debug, Default)]
pub struct StubRegistry {
    mode: StubMode,
    entries: Mutex<HashMap<StubKey, StubEntry>>,
}

impl StubRegistry {
    /// Registry that lets unmatched requests reach the network.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::with_mode(StubMode::Passthrough)
    }

    /// Registry that rejects unmatched requests.
    #[must_use]
    pub fn strict() -> Self {
        Self::with_mode(StubMode::Strict)
    }

    /// Registry with an explicit mode.
    #[must_use]
    pub fn with_mode(mode: StubMode) -> Self {
        Self {
            mode,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Mode governing unmatched requests.
    #[must_use]
    pub const fn mode(&self) -> StubMode {
        self.mode
    }

    /// Registers (or replaces) the response for `method` + `url`.
    pub fn register(
        &self,
        method: Method,
        url: &str,
        response: StubResponse,
    ) -> Result<(), StubError> {
        let parsed = Url::parse(url).map_err(|source| StubError::InvalidUrl {
            url: url.to_owned(),
            source,
        })?;
        self.register_url(method, &parsed, response);
        Ok(())
    }

    /// Registers a response for an already-parsed URL.
    pub fn register_url(&self, method: Method, url: &Url, response: StubResponse) {
        debug!(
            target: STUB_TARGET,
            %method,
            url = %url,
            status = response.status(),
            "registered stub"
        );
        self.lock().insert(
            (method, url.as_str().to_owned()),
            StubEntry { response, hits: 0 },
        );
    }

    /// Returns the canned response for a request, counting the hit.
    #[must_use]
    pub fn respond(&self, method: Method, url: &Url) -> Option<StubResponse> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&(method, url.as_str().to_owned()))?;
        entry.hits += 1;
        debug!(
            target: STUB_TARGET,
            %method,
            url = %url,
            hits = entry.hits,
            "served stub"
        );
        Some(entry.response.clone())
    }

    /// Number of times the stub for `method` + `url` has been served.
    #[must_use]
    pub fn hits(&self, method: Method, url: &str) -> usize {
        let Ok(parsed) = Url::parse(url) else {
            return 0;
        };
        self.lock()
            .get(&(method, parsed.as_str().to_owned()))
            .map_or(0, |entry| entry.hits)
    }

    /// Returns `true` when a response is registered for `method` + `url`.
    #[must_use]
    pub fn contains(&self, method: Method, url: &str) -> bool {
        Url::parse(url).is_ok_and(|parsed| {
            self.lock()
                .contains_key(&(method, parsed.as_str().to_owned()))
        })
    }

    /// Number of registered stubs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<StubKey, StubEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
