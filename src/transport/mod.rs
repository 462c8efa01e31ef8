//! HTTP transport layer for the SCC client.
//!
//! The transport is injectable: services talk to an [`HttpTransport`] and
//! never to reqwest directly, so tests can substitute a mock.

mod http;

pub use self::http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use std::time::Duration;

/// Transport configuration for [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-request timeout applied by the HTTP client.
    pub timeout: Duration,
    /// Skip TLS certificate verification. Only for testing.
    pub disable_ssl_verification: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            disable_ssl_verification: false,
        }
    }
}

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// Reading or writing the body failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error message.
        message: String,
    },

    /// The client could not be built or the request was rejected locally.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },
}
