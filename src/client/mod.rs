//! Base service shared by every SCC service client.
//!
//! [`BaseService`] owns the resolved configuration and executes requests:
//! each attempt authenticates a fresh copy of the request, sends it through
//! the transport under the caller's [`RequestContext`], and the retry policy
//! decides whether to try again. Successful bodies are decoded into
//! [`DetailedResponse`].

mod response;

pub use response::DetailedResponse;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::auth::{authenticator_from_properties, Authenticator};
use crate::config::{validate_service_url, ServiceConfig, ServiceConfigBuilder, UrlTemplate};
use crate::context::RequestContext;
use crate::errors::{SccError, SccResult};
use crate::observability::redacted_headers;
use crate::request::RequestBuilder;
use crate::resilience::{RetryConfig, RetryPolicy};
use crate::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportConfig,
};

/// Returns the `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!(
        "scc-rust-sdk/{} (os={}; arch={}; lang=rust)",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Configured handle shared by the service clients.
///
/// Cloning yields an independent configuration; the transport and the
/// authenticator are shared.
#[derive(Clone)]
pub struct BaseService {
    config: ServiceConfig,
    authenticator: Arc<dyn Authenticator>,
    transport: Arc<dyn HttpTransport>,
}

impl BaseService {
    /// Creates a service from resolved parts. Validates the authenticator.
    pub fn new(
        config: ServiceConfig,
        authenticator: Arc<dyn Authenticator>,
        transport: Arc<dyn HttpTransport>,
    ) -> SccResult<Self> {
        authenticator.validate()?;
        Ok(Self {
            config,
            authenticator,
            transport,
        })
    }

    /// Creates a builder for the service named `service_name`.
    pub fn builder(service_name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder::new(service_name)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Returns the service URL; empty when the service is disabled.
    pub fn service_url(&self) -> &str {
        &self.config.service_url
    }

    /// Returns the authenticator.
    pub fn authenticator(&self) -> &Arc<dyn Authenticator> {
        &self.authenticator
    }

    /// Sets the service URL. An empty URL disables the service.
    pub fn set_service_url(&mut self, url: &str) -> SccResult<()> {
        self.config.service_url = validate_service_url(url)?;
        Ok(())
    }

    /// Turns on automatic retries.
    pub fn enable_retries(&mut self, max_retries: u32, max_interval: Duration) {
        self.config.retry = RetryConfig::new()
            .max_retries(max_retries)
            .max_interval(max_interval);
    }

    /// Turns off automatic retries.
    pub fn disable_retries(&mut self) {
        self.config.retry = RetryConfig::no_retries();
    }

    /// Sets the retry configuration.
    pub fn set_retry_config(&mut self, retry: RetryConfig) {
        self.config.retry = retry;
    }

    /// Enables or disables gzip request compression.
    pub fn set_enable_gzip(&mut self, enabled: bool) {
        self.config.enable_gzip = enabled;
    }

    /// Replaces the headers added to every request.
    pub fn set_default_headers(&mut self, headers: HeaderMap) {
        self.config.default_headers = headers;
    }

    /// Starts a request against `path_template` resolved with `params`.
    pub fn request_builder(
        &self,
        method: HttpMethod,
        path_template: &str,
        params: &[(&str, &str)],
    ) -> SccResult<RequestBuilder> {
        let user_agent = HeaderValue::from_str(&user_agent())
            .map_err(|_| SccError::configuration("invalid User-Agent"))?;
        let mut defaults = HeaderMap::new();
        defaults.insert(USER_AGENT, user_agent);
        defaults.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &self.config.default_headers {
            defaults.insert(name.clone(), value.clone());
        }

        Ok(RequestBuilder::new(method, &self.config.service_url)?
            .resolve_path(path_template, params)?
            .typed_headers(&defaults)
            .gzip(self.config.enable_gzip))
    }

    /// Executes `request` and decodes the body into `T`.
    ///
    /// An empty body yields `result: None`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<T>> {
        let response = self.execute(request, ctx).await?;
        decode(response)
    }

    /// Executes `request` without decoding the body.
    pub async fn request_no_content(
        &self,
        request: HttpRequest,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse> {
        let response = self.execute(request, ctx).await?;
        Ok(DetailedResponse::from(response))
    }

    async fn execute(&self, request: HttpRequest, ctx: &RequestContext) -> SccResult<HttpResponse> {
        let policy = RetryPolicy::new(self.config.retry.clone());
        policy
            .execute(ctx, |attempt| self.attempt(&request, ctx, attempt))
            .await
    }

    async fn attempt(
        &self,
        request: &HttpRequest,
        ctx: &RequestContext,
        attempt: u32,
    ) -> SccResult<HttpResponse> {
        let mut request = request.clone();
        ctx.run("authenticating", self.authenticator.authenticate(&mut request))
            .await??;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt,
            "Sending request"
        );
        tracing::trace!(headers = ?redacted_headers(&request.headers), "Request headers");

        let started = Instant::now();
        let response = ctx
            .run("sending request", self.transport.send(request))
            .await??;

        tracing::debug!(
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            attempt,
            "Received response"
        );

        if response.is_success() {
            Ok(response)
        } else {
            Err(SccError::from_response(DetailedResponse::from(response)))
        }
    }
}

impl std::fmt::Debug for BaseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseService")
            .field("config", &self.config)
            .field("auth_type", &self.authenticator.auth_type())
            .finish()
    }
}

fn decode<T: DeserializeOwned>(response: HttpResponse) -> SccResult<DetailedResponse<T>> {
    let raw = DetailedResponse::from(response);
    if raw.raw_body.iter().all(u8::is_ascii_whitespace) {
        return Ok(raw.with_result(None));
    }

    if let Some(content_type) = raw.header(CONTENT_TYPE.as_str()) {
        if !is_json(content_type) {
            return Err(SccError::Decode {
                message: format!("expected a JSON response, got content type '{content_type}'"),
                response: Some(Box::new(raw)),
            });
        }
    }

    match serde_json::from_slice::<T>(&raw.raw_body) {
        Ok(result) => Ok(raw.with_result(Some(result))),
        Err(e) => Err(SccError::Decode {
            message: format!("unable to decode response body: {e}"),
            response: Some(Box::new(raw)),
        }),
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .parse::<mime::Mime>()
        .map(|m| m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        .unwrap_or(false)
}

/// Builder for [`BaseService`] and the service clients.
///
/// Values set here win over environment variables and the credentials file,
/// which win over the built-in default URL.
pub struct ServiceBuilder {
    config: ServiceConfigBuilder,
    url_template: Option<UrlTemplate>,
    url_variables: HashMap<String, String>,
    authenticator: Option<Arc<dyn Authenticator>>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl ServiceBuilder {
    /// Creates a builder for the service named `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            config: ServiceConfigBuilder::new(service_name),
            url_template: None,
            url_variables: HashMap::new(),
            authenticator: None,
            transport: None,
        }
    }

    /// Sets the name used for external configuration lookup.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config = self.config.service_name(name);
        self
    }

    /// Sets the service URL.
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.service_url(url);
        self
    }

    /// Sets the built-in default URL.
    pub fn default_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.default_url(url);
        self
    }

    /// Sets the template the default URL is resolved from.
    pub fn url_template(mut self, template: UrlTemplate) -> Self {
        self.url_template = Some(template);
        self
    }

    /// Sets a variable of the URL template.
    pub fn url_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_variables.insert(name.into(), value.into());
        self
    }

    /// Sets all variables of the URL template.
    pub fn url_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.url_variables = variables;
        self
    }

    /// Sets the authenticator.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Enables or disables gzip request compression.
    pub fn enable_gzip(mut self, enabled: bool) -> Self {
        self.config = self.config.enable_gzip(enabled);
        self
    }

    /// Disables TLS verification of the default transport.
    pub fn disable_ssl_verification(mut self, disabled: bool) -> Self {
        self.config = self.config.disable_ssl_verification(disabled);
        self
    }

    /// Sets the timeout of the default transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Adds a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config = self.config.retry(retry);
        self
    }

    /// Controls whether environment variables and the credentials file are read.
    pub fn load_external_config(mut self, load: bool) -> Self {
        self.config = self.config.load_external_config(load);
        self
    }

    /// Builds a service client.
    pub fn build<S: From<BaseService>>(self) -> SccResult<S> {
        self.build_base().map(S::from)
    }

    /// Builds the base service.
    pub fn build_base(self) -> SccResult<BaseService> {
        let mut config = self.config;
        match self.url_template {
            // Template variables count as an explicit URL unless one was given.
            Some(template) if !self.url_variables.is_empty() && !config.has_service_url() => {
                config = config.service_url(template.resolve(&self.url_variables)?);
            }
            Some(template) => config = config.default_url(template.resolve(&self.url_variables)?),
            None if !self.url_variables.is_empty() => {
                return Err(SccError::configuration(
                    "URL variables were given but the service has no URL template",
                ))
            }
            None => {}
        }

        let (config, properties) = config.build_with_properties()?;

        let authenticator = match self.authenticator {
            Some(authenticator) => authenticator,
            None => authenticator_from_properties(&properties)?,
        };

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(
                ReqwestTransport::new(TransportConfig {
                    timeout: config.timeout,
                    disable_ssl_verification: config.disable_ssl_verification,
                })
                .map_err(|e| SccError::configuration(e.to_string()))?,
            ),
        };

        tracing::debug!(
            service = %config.service_name,
            url = %config.service_url,
            auth_type = %authenticator.auth_type(),
            "Built service client"
        );

        BaseService::new(config, authenticator, transport)
    }
}

impl std::fmt::Debug for ServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBuilder")
            .field("config", &self.config)
            .field("url_template", &self.url_template)
            .field("url_variables", &self.url_variables)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::BearerTokenAuthenticator;
    use crate::mocks::{MockAuthenticator, MockResponse, MockTransport};
    use serde_json::{json, Value};

    const URL: &str = "https://scc.example.com";

    fn service(transport: &Arc<MockTransport>) -> BaseService {
        BaseService::builder("test_service")
            .service_url(URL)
            .authenticator(Arc::new(MockAuthenticator::default()))
            .transport(transport.clone())
            .load_external_config(false)
            .build_base()
            .unwrap()
    }

    fn get(service: &BaseService) -> HttpRequest {
        service
            .request_builder(HttpMethod::Get, "/settings", &[])
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_request_decodes_json() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"success": true}));
        let service = service(&transport);

        let response: DetailedResponse<Value> = service
            .request(get(&service), &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.result, Some(json!({"success": true})));

        let sent = transport.last_request().unwrap();
        assert_eq!(sent.header("authorization"), Some("Bearer mock-token"));
        assert_eq!(sent.header("accept"), Some("application/json"));
        assert!(sent.header("user-agent").unwrap().starts_with("scc-rust-sdk/"));
    }

    #[tokio::test]
    async fn test_empty_body_has_no_result() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::empty(204));
        let service = service(&transport);

        let response: DetailedResponse<Value> = service
            .request(get(&service), &RequestContext::background())
            .await
            .unwrap();
        assert_eq!(response.status_code, 204);
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn test_malformed_json_is_decode_error_with_response() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: b"} this is not valid json {".to_vec(),
        });
        let service = service(&transport);

        let err = service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap_err();

        assert!(matches!(err, SccError::Decode { .. }));
        assert_eq!(err.status_code(), Some(200));
    }

    #[tokio::test]
    async fn test_non_json_content_type_is_decode_error() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockResponse::empty(200)
                .with_header("content-type", "text/html")
                .with_status(200),
        );
        transport.queue(MockResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: b"<html></html>".to_vec(),
        });
        let service = service(&transport);

        // Empty bodies are never decoded, whatever the content type.
        let empty = service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap();
        assert!(empty.result.is_none());

        let err = service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap_err();
        assert!(matches!(err, SccError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_api_error_carries_response() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::error(404, "rule not found").with_header("x-request-id", "r1"));
        let service = service(&transport);

        let err = service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap_err();

        match err {
            SccError::Api {
                status_code,
                message,
                response,
                ..
            } => {
                assert_eq!(status_code, 404);
                assert_eq!(message, "rule not found");
                assert_eq!(response.header("X-Request-Id"), Some("r1"));
            }
            other => panic!("Expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_error(500, "boom");
        transport.queue_connection_error("reset");
        transport.queue_json(&json!({}));
        let mut service = service(&transport);
        service.set_retry_config(
            RetryConfig::new()
                .max_retries(3)
                .initial_interval(Duration::from_millis(1))
                .max_interval(Duration::from_millis(5)),
        );

        let response = service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_authenticator_invoked_per_attempt() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({}));
        let auth = Arc::new(MockAuthenticator::default().fail_next(1));
        let mut service = BaseService::builder("test_service")
            .service_url(URL)
            .authenticator(auth.clone())
            .transport(transport.clone())
            .load_external_config(false)
            .build_base()
            .unwrap();
        service.enable_retries(2, Duration::from_millis(5));

        service
            .request::<Value>(get(&service), &RequestContext::background())
            .await
            .unwrap();

        assert_eq!(auth.calls(), 2);
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn test_empty_url_is_service_url_missing() {
        let transport = Arc::new(MockTransport::new());
        let mut service = service(&transport);
        service.set_service_url("").unwrap();

        let err = service
            .request_builder(HttpMethod::Get, "/settings", &[])
            .unwrap_err();
        assert!(err.to_string().contains("service URL missing"));
    }

    #[test]
    fn test_clone_is_independent() {
        let transport = Arc::new(MockTransport::new());
        let original = service(&transport);
        let mut clone = original.clone();

        assert_eq!(clone.service_url(), original.service_url());
        clone.set_service_url("https://other.example.com/").unwrap();

        assert_eq!(clone.service_url(), "https://other.example.com");
        assert_eq!(original.service_url(), URL);
    }

    #[test]
    fn test_default_headers_applied() {
        let transport = Arc::new(MockTransport::new());
        let service = BaseService::builder("test_service")
            .service_url(URL)
            .header("X-Team", "compliance")
            .authenticator(Arc::new(BearerTokenAuthenticator::new("t")))
            .transport(transport)
            .load_external_config(false)
            .build_base()
            .unwrap();

        let request = get(&service);
        assert_eq!(request.header("x-team"), Some("compliance"));
    }

    #[test]
    fn test_invalid_authenticator_rejected_at_build() {
        let result = BaseService::builder("test_service")
            .service_url(URL)
            .authenticator(Arc::new(BearerTokenAuthenticator::new("")))
            .transport(Arc::new(MockTransport::new()))
            .load_external_config(false)
            .build_base();
        assert!(matches!(result, Err(SccError::AuthConfig { .. })));
    }

    #[test]
    fn test_missing_authenticator_is_config_error() {
        let result = BaseService::builder("test_service")
            .service_url(URL)
            .transport(Arc::new(MockTransport::new()))
            .load_external_config(false)
            .build_base();
        assert!(matches!(result, Err(SccError::Configuration { .. })));
    }

    #[test]
    fn test_url_variables_without_template_rejected() {
        let result = BaseService::builder("test_service")
            .url_variable("region", "eu-de")
            .authenticator(Arc::new(MockAuthenticator::default()))
            .transport(Arc::new(MockTransport::new()))
            .load_external_config(false)
            .build_base();
        assert!(result.is_err());
    }

    #[test]
    fn test_is_json() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(is_json("application/problem+json"));
        assert!(!is_json("text/plain"));
    }
}
