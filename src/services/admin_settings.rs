//! Admin settings service.
//!
//! The base URL is a template embedding the region and the instance id, so
//! paths are relative to the instance.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::common::{validate_patch, Operation};
use crate::auth::Authenticator;
use crate::client::{BaseService, DetailedResponse, ServiceBuilder};
use crate::config::UrlTemplate;
use crate::context::RequestContext;
use crate::errors::SccResult;
use crate::request::CONTENT_TYPE_JSON_PATCH;
use crate::transport::HttpMethod;
use crate::types::{JsonPatchOperation, Settings, TestEvent};

/// Options for [`AdminSettingsService::get_settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetSettingsOptions {
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

/// Options for [`AdminSettingsService::patch_settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSettingsOptions {
    /// Patch operations; must not be empty.
    pub body: Vec<JsonPatchOperation>,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl PatchSettingsOptions {
    /// Creates options for `body`.
    pub fn new(body: Vec<JsonPatchOperation>) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }
}

/// Options for [`AdminSettingsService::post_test_event`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostTestEventOptions {
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

/// Client for the admin settings API.
#[derive(Debug, Clone)]
pub struct AdminSettingsService {
    service: BaseService,
}

impl AdminSettingsService {
    /// Name used for external configuration, e.g. `ADMIN_SETTINGS_URL`.
    pub const SERVICE_NAME: &'static str = "admin_settings";

    /// Template of the default service URL.
    pub const DEFAULT_URL_TEMPLATE: UrlTemplate = UrlTemplate::new(
        "https://{region}.compliance.cloud.ibm.com/instances/{instance_id}/v3",
        &[("region", "us-south"), ("instance_id", "instance_id")],
    );

    const GET_SETTINGS: Operation = Operation::new(Self::SERVICE_NAME, "GetSettings");
    const PATCH_SETTINGS: Operation = Operation::new(Self::SERVICE_NAME, "PatchSettings");
    const POST_TEST_EVENT: Operation = Operation::new(Self::SERVICE_NAME, "PostTestEvent");

    /// Returns a builder preset with the service name and URL template.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new(Self::SERVICE_NAME).url_template(Self::DEFAULT_URL_TEMPLATE)
    }

    /// Creates a client with the default configuration.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> SccResult<Self> {
        Self::builder().authenticator(authenticator).build()
    }

    /// Resolves the URL template with `variables` (`region`, `instance_id`).
    pub fn construct_service_url(variables: &HashMap<String, String>) -> SccResult<String> {
        Self::DEFAULT_URL_TEMPLATE.resolve(variables)
    }

    /// Returns the underlying base service.
    pub fn service(&self) -> &BaseService {
        &self.service
    }

    /// Returns the underlying base service mutably.
    pub fn service_mut(&mut self) -> &mut BaseService {
        &mut self.service
    }

    /// Returns the service URL.
    pub fn service_url(&self) -> &str {
        self.service.service_url()
    }

    /// Sets the service URL. An empty URL disables the service.
    pub fn set_service_url(&mut self, url: &str) -> SccResult<()> {
        self.service.set_service_url(url)
    }

    /// Turns on automatic retries.
    pub fn enable_retries(&mut self, max_retries: u32, max_interval: Duration) {
        self.service.enable_retries(max_retries, max_interval);
    }

    /// Turns off automatic retries.
    pub fn disable_retries(&mut self) {
        self.service.disable_retries();
    }

    /// Gets the settings.
    pub async fn get_settings(
        &self,
        options: &GetSettingsOptions,
    ) -> SccResult<DetailedResponse<Settings>> {
        self.get_settings_with_context(options, &RequestContext::background())
            .await
    }

    /// Gets the settings under `ctx`.
    #[instrument(skip_all, fields(operation = "GetSettings"))]
    pub async fn get_settings_with_context(
        &self,
        options: &GetSettingsOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Settings>> {
        let builder = self
            .service
            .request_builder(HttpMethod::Get, "/settings", &[])?;
        let request = Self::GET_SETTINGS
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Applies a JSON Patch to the settings.
    pub async fn patch_settings(
        &self,
        options: &PatchSettingsOptions,
    ) -> SccResult<DetailedResponse<Settings>> {
        self.patch_settings_with_context(options, &RequestContext::background())
            .await
    }

    /// Applies a JSON Patch to the settings under `ctx`.
    #[instrument(skip_all, fields(operation = "PatchSettings", ops = options.body.len()))]
    pub async fn patch_settings_with_context(
        &self,
        options: &PatchSettingsOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Settings>> {
        validate_patch(&options.body)?;

        let builder = self
            .service
            .request_builder(HttpMethod::Patch, "/settings", &[])?;
        let request = Self::PATCH_SETTINGS
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .json_body(&options.body, CONTENT_TYPE_JSON_PATCH)?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Sends a test event through the Event Notifications integration.
    pub async fn post_test_event(
        &self,
        options: &PostTestEventOptions,
    ) -> SccResult<DetailedResponse<TestEvent>> {
        self.post_test_event_with_context(options, &RequestContext::background())
            .await
    }

    /// Sends a test event under `ctx`.
    #[instrument(skip_all, fields(operation = "PostTestEvent"))]
    pub async fn post_test_event_with_context(
        &self,
        options: &PostTestEventOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<TestEvent>> {
        let builder = self
            .service
            .request_builder(HttpMethod::Post, "/test_event", &[])?;
        let request = Self::POST_TEST_EVENT
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request(request, ctx).await
    }
}

impl From<BaseService> for AdminSettingsService {
    fn from(service: BaseService) -> Self {
        Self { service }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SccError;
    use crate::mocks::{fixtures, MockAuthenticator, MockResponse, MockTransport};
    use crate::types::PatchOp;
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>) -> AdminSettingsService {
        AdminSettingsService::builder()
            .url_variable("instance_id", "abc123")
            .authenticator(Arc::new(MockAuthenticator::default()))
            .transport(transport.clone())
            .load_external_config(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_url_from_template() {
        let transport = Arc::new(MockTransport::new());
        let service = client(&transport);
        assert_eq!(
            service.service_url(),
            "https://us-south.compliance.cloud.ibm.com/instances/abc123/v3"
        );
    }

    #[test]
    fn test_construct_service_url() {
        let variables: HashMap<String, String> =
            [("region".to_string(), "eu-de".to_string())].into_iter().collect();
        assert_eq!(
            AdminSettingsService::construct_service_url(&variables).unwrap(),
            "https://eu-de.compliance.cloud.ibm.com/instances/instance_id/v3"
        );

        let unknown: HashMap<String, String> =
            [("zone".to_string(), "1".to_string())].into_iter().collect();
        assert!(matches!(
            AdminSettingsService::construct_service_url(&unknown),
            Err(SccError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_settings() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::settings());
        let service = client(&transport);

        let response = service
            .get_settings(&GetSettingsOptions {
                x_request_id: Some("req-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let settings = response.result.unwrap();
        assert_eq!(
            settings.object_storage.unwrap().bucket.as_deref(),
            Some("scc-results")
        );

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url.path(), "/instances/abc123/v3/settings");
        assert!(request.body.is_none());
        assert!(request.header("content-type").is_none());
        assert_eq!(request.header("x-request-id"), Some("req-1"));
        assert_eq!(
            request.header("x-ibmcloud-sdk-analytics"),
            Some("service_name=admin_settings;service_version=V1;operation_id=GetSettings")
        );
    }

    #[tokio::test]
    async fn test_patch_settings_body() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::settings());
        let service = client(&transport);

        service
            .patch_settings(&PatchSettingsOptions::new(vec![
                JsonPatchOperation::replace("/object_storage/bucket", "new-bucket"),
            ]))
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(
            request.header("content-type"),
            Some("application/json-patch+json")
        );
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(
            body,
            json!([{"op": "replace", "path": "/object_storage/bucket", "value": "new-bucket"}])
        );
    }

    #[tokio::test]
    async fn test_patch_settings_validation_makes_no_request() {
        let transport = Arc::new(MockTransport::new());
        let service = client(&transport);

        let empty = service.patch_settings(&PatchSettingsOptions::default()).await;
        assert!(matches!(empty, Err(SccError::Validation { .. })));

        let invalid = service
            .patch_settings(&PatchSettingsOptions::new(vec![JsonPatchOperation {
                op: PatchOp::Add,
                path: "/labels".to_string(),
                from: None,
                value: None,
            }]))
            .await;
        assert!(matches!(invalid, Err(SccError::Validation { .. })));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_post_test_event() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&json!({"success": true})).with_status(202));
        let service = client(&transport);

        let response = service
            .post_test_event(&PostTestEventOptions::default())
            .await
            .unwrap();

        assert_eq!(response.status_code, 202);
        assert_eq!(response.result, Some(TestEvent { success: true }));
        assert_eq!(
            transport.last_request().unwrap().url.path(),
            "/instances/abc123/v3/test_event"
        );
    }
}
