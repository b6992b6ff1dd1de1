//! Error surface of the client handle.

use std::io;

use camino::Utf8PathBuf;
use thiserror::Error;

use super::Method;

/// Errors raised while building the client or issuing requests.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service answered with a non-success status code.
    #[error("service returned HTTP {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The configured address is not a valid URL.
    #[error("invalid service address '{address}': {source}")]
    InvalidAddress {
        /// Address as configured.
        address: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// A request path could not be joined onto the base address.
    #[error("invalid request path '{path}': {source}")]
    InvalidPath {
        /// Path as supplied.
        path: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The verb could not be expressed on the wire.
    #[error("request method {method} is not a valid HTTP token")]
    UnsupportedMethod {
        /// Offending verb.
        method: Method,
    },
    /// The trust bundle could not be read.
    #[error("failed to read trust bundle {path}: {source}")]
    TrustBundle {
        /// Bundle path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The trust bundle was not valid PEM.
    #[error("invalid certificate in trust bundle {path}: {source}")]
    Certificate {
        /// Bundle path.
        path: Utf8PathBuf,
        /// Underlying TLS error.
        #[source]
        source: reqwest::Error,
    },
    /// The HTTP transport could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    Build {
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The request could not be sent or the response not read.
    #[error("{method} {url} failed: {source}")]
    Transport {
        /// Verb of the failed request.
        method: Method,
        /// Target URL.
        url: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// A request payload could not be serialised.
    #[error("failed to encode request body for {path}: {source}")]
    Encode {
        /// Request path.
        path: String,
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// A response body did not match the expected shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// Source URL.
        url: String,
        /// Underlying deserialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// Strict stub mode saw a request with no registered response.
    #[error("no stubbed response registered for {method} {url}")]
    Unstubbed {
        /// Verb of the request.
        method: Method,
        /// Target URL.
        url: String,
    },
}

impl ClientError {
    /// HTTP status code for [`ClientError::Api`] failures.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` when the service rejected the request body as invalid.
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(self, Self::Api { status: 400, .. })
    }
}
