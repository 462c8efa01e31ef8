//! Mock implementations for testing.
//!
//! Provides a mock transport and authenticator for unit testing without
//! making real API calls.

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::auth::{AuthType, Authenticator};
use crate::errors::{SccError, SccResult};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

/// Mock HTTP transport for testing.
///
/// Responses are served in the order they were queued; once the queue is
/// empty the default response is used.
pub struct MockTransport {
    responses: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<MockResponse>>,
}

#[derive(Debug, Clone)]
enum MockOutcome {
    Response(MockResponse),
    ConnectionError(String),
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Creates an error response carrying a problem document.
    pub fn error(status: u16, message: &str) -> Self {
        let problem = serde_json::json!({
            "errors": [{ "code": "mock_error", "message": message }],
            "trace": "mock-trace",
            "status_code": status,
        });
        Self::json(&problem).with_status(status)
    }

    /// Creates a response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Creates a response with custom status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn into_http(self) -> HttpResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        HttpResponse {
            status: self.status,
            headers,
            body: Bytes::from(self.body),
        }
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            default_response: Mutex::new(None),
        }
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        lock(&self.responses).push_back(MockOutcome::Response(response));
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Queues a connection failure.
    pub fn queue_connection_error(&self, message: &str) {
        lock(&self.responses).push_back(MockOutcome::ConnectionError(message.to_string()));
    }

    /// Sets the default response.
    pub fn set_default(&self, response: MockResponse) {
        *lock(&self.default_response) = Some(response);
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        lock(&self.requests).len()
    }

    fn next_outcome(&self) -> MockOutcome {
        if let Some(outcome) = lock(&self.responses).pop_front() {
            return outcome;
        }
        let fallback = lock(&self.default_response).clone();
        MockOutcome::Response(
            fallback.unwrap_or_else(|| MockResponse::error(500, "No mock response configured")),
        )
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.requests).push(request);

        match self.next_outcome() {
            MockOutcome::Response(response) => Ok(response.into_http()),
            MockOutcome::ConnectionError(message) => Err(TransportError::Connection { message }),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("request_count", &self.request_count())
            .finish()
    }
}

/// Mock authenticator for testing.
///
/// Adds `Authorization: Bearer <token>` and counts invocations. It can be
/// told to fail the first few calls with a transient token error.
pub struct MockAuthenticator {
    token: String,
    calls: AtomicU32,
    transient_failures: AtomicU32,
}

impl MockAuthenticator {
    /// Creates a new mock authenticator.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            calls: AtomicU32::new(0),
            transient_failures: AtomicU32::new(0),
        }
    }

    /// Fails the next `count` calls with [`SccError::AuthTransport`].
    pub fn fail_next(self, count: u32) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Returns how many times `authenticate` was called.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::new("mock-token")
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::BearerToken
    }

    fn validate(&self) -> SccResult<()> {
        Ok(())
    }

    async fn authenticate(&self, request: &mut HttpRequest) -> SccResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SccError::AuthTransport {
                message: "mock token endpoint unavailable".to_string(),
            });
        }

        let value = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
            SccError::AuthConfig {
                message: "invalid mock token".to_string(),
            }
        })?;
        request.headers.insert(http::header::AUTHORIZATION, value);
        Ok(())
    }
}

impl std::fmt::Debug for MockAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockAuthenticator")
            .field("calls", &self.calls())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Test fixtures for common response bodies.
pub mod fixtures {
    use serde_json::{json, Value};

    /// A settings document with both integrations configured.
    pub fn settings() -> Value {
        json!({
            "event_notifications": {
                "instance_crn": "crn:v1:bluemix:public:event-notifications:us-south:a/acct:inst::",
                "updated_on": "2024-01-15T10:00:00Z",
                "source_id": "crn:v1:bluemix:public:compliance:us-south:a/acct:inst::",
                "source_name": "scc-source",
                "source_description": "SCC notifications"
            },
            "object_storage": {
                "instance_crn": "crn:v1:bluemix:public:cloud-object-storage:global:a/acct:cos::",
                "bucket": "scc-results",
                "bucket_location": "us-south",
                "bucket_endpoint": "s3.us-south.cloud-object-storage.appdomain.cloud",
                "updated_on": "2024-01-15T10:00:00Z"
            }
        })
    }

    /// A single custom rule.
    pub fn rule(id: &str) -> Value {
        json!({
            "id": id,
            "type": "user_defined",
            "version": "1.0.0",
            "description": "Require public access to be disabled",
            "account_id": "acct",
            "created_by": "IBMid-123",
            "created_on": "2024-01-15T10:00:00Z",
            "target": {
                "service_name": "cloud-object-storage",
                "resource_kind": "bucket",
                "additional_target_attributes": []
            },
            "required_config": {
                "description": "public access",
                "property": "public_access_enabled",
                "operator": "is_false"
            },
            "labels": []
        })
    }
}
