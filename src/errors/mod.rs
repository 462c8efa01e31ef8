//! Error types for the SCC client.
//!
//! Every operation returns [`SccResult`]. Errors raised after a round trip
//! carry the [`DetailedResponse`] so callers can inspect status and headers.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::client::DetailedResponse;
use crate::resilience::retry_after_from_headers;
use crate::transport::TransportError;

/// Result type alias for SCC operations.
pub type SccResult<T> = Result<T, SccError>;

/// Error type for SCC client operations.
#[derive(Debug, Error)]
pub enum SccError {
    /// A required field is missing or an argument is illegal. Raised before any I/O.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
        /// The offending field, when known.
        field: Option<String>,
    },

    /// The client is misconfigured (missing or malformed URL, unknown auth type, ...).
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration issue.
        message: String,
    },

    /// A token could not be acquired; the request may be retried.
    #[error("Authentication transport error: {message}")]
    AuthTransport {
        /// Error message.
        message: String,
    },

    /// The authenticator is unusable. Never retried.
    #[error("Authentication configuration error: {message}")]
    AuthConfig {
        /// Error message.
        message: String,
    },

    /// Connect, read, write or TLS failure.
    #[error("Network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// The caller's deadline elapsed.
    #[error("deadline exceeded: {message}")]
    Deadline {
        /// Where the deadline was observed.
        message: String,
    },

    /// The caller cancelled the request.
    #[error("Request cancelled: {message}")]
    Cancelled {
        /// Where the cancellation was observed.
        message: String,
    },

    /// The service answered with a non-2xx status.
    #[error("API error (HTTP {status_code}): {message}")]
    Api {
        /// HTTP status code.
        status_code: u16,
        /// Best-effort message extracted from the problem document.
        message: String,
        /// Decoded problem document, when the body was one.
        problem: Option<ProblemDocument>,
        /// Status, headers and raw body of the response.
        response: Box<DetailedResponse>,
    },

    /// The response body could not be decoded into the expected type.
    #[error("Decode error: {message}")]
    Decode {
        /// Error message.
        message: String,
        /// The response whose body failed to decode, if any.
        response: Option<Box<DetailedResponse>>,
    },
}

impl SccError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        SccError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a validation error naming the offending field.
    pub fn validation_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        SccError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        SccError::Configuration {
            message: message.into(),
        }
    }

    /// Creates a decode error with no attached response.
    pub fn decode(message: impl Into<String>) -> Self {
        SccError::Decode {
            message: message.into(),
            response: None,
        }
    }

    /// Returns true if the retry engine may try the request again.
    pub fn is_retryable(&self) -> bool {
        match self {
            SccError::Network { .. } | SccError::AuthTransport { .. } => true,
            SccError::Api { status_code, .. } => {
                matches!(status_code, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Returns the server-requested delay from a `Retry-After` header.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SccError::Api { response, .. } => retry_after_from_headers(&response.headers),
            _ => None,
        }
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|r| r.status_code)
    }

    /// Returns the response associated with this error, if a round trip happened.
    pub fn response(&self) -> Option<&DetailedResponse> {
        match self {
            SccError::Api { response, .. } => Some(response),
            SccError::Decode { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns true for deadline and cancellation errors.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, SccError::Deadline { .. } | SccError::Cancelled { .. })
    }

    /// Builds an [`SccError::Api`] from a non-2xx response.
    pub(crate) fn from_response(response: DetailedResponse) -> Self {
        let problem = ProblemDocument::parse(&response.raw_body);
        let message = problem
            .as_ref()
            .and_then(ProblemDocument::summary)
            .unwrap_or_else(|| {
                http::StatusCode::from_u16(response.status_code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unexpected status")
                    .to_string()
            });

        SccError::Api {
            status_code: response.status_code,
            message,
            problem,
            response: Box::new(response),
        }
    }
}

/// Problem document returned by the service on failures.
///
/// The service uses either an `errors` array or a flat `message`/`trace` pair.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProblemDocument {
    /// Individual error entries.
    #[serde(default)]
    pub errors: Vec<ProblemDetail>,
    /// Top-level message.
    pub message: Option<String>,
    /// Alternate top-level message key used by some endpoints.
    pub error: Option<String>,
    /// Request trace identifier.
    pub trace: Option<String>,
    /// Status code echoed in the body.
    pub status_code: Option<u16>,
}

/// One entry of [`ProblemDocument::errors`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ProblemDetail {
    /// Machine-readable error code.
    pub code: Option<String>,
    /// Human-readable message.
    pub message: Option<String>,
    /// Link to documentation.
    pub more_info: Option<String>,
}

impl ProblemDocument {
    /// Parses a problem document, returning `None` if the body is not one.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        let doc: ProblemDocument = serde_json::from_slice(body).ok()?;
        if doc.errors.is_empty() && doc.message.is_none() && doc.error.is_none() {
            return None;
        }
        Some(doc)
    }

    /// Returns the most specific message available.
    pub fn summary(&self) -> Option<String> {
        self.errors
            .iter()
            .find_map(|e| e.message.clone())
            .or_else(|| self.message.clone())
            .or_else(|| self.error.clone())
    }
}

impl From<TransportError> for SccError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidRequest { .. } => SccError::validation(err.to_string()),
            _ => SccError::Network {
                message: err.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for SccError {
    fn from(err: serde_json::Error) -> Self {
        SccError::decode(err.to_string())
    }
}

impl From<url::ParseError> for SccError {
    fn from(err: url::ParseError) -> Self {
        SccError::Configuration {
            message: format!("Invalid URL: {err}"),
        }
    }
}
