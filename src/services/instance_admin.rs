//! Instance administration service.
//!
//! Same settings API as [`AdminSettingsService`](super::AdminSettingsService),
//! but against a regional base URL with the instance id in every path. Also
//! covers instance access and plans.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::common::{require, validate_patch, Operation};
use crate::auth::Authenticator;
use crate::client::{BaseService, DetailedResponse, ServiceBuilder};
use crate::config::regional_url;
use crate::context::RequestContext;
use crate::errors::SccResult;
use crate::request::{CONTENT_TYPE_JSON, CONTENT_TYPE_JSON_PATCH};
use crate::transport::HttpMethod;
use crate::types::{
    InstanceAccess, InstancePlan, InstancePlans, JsonPatchOperation, PlanPrototype, Settings,
    TestEvent,
};

const SETTINGS_PATH: &str = "/instances/{instance_id}/v3/settings";
const ACCESS_PATH: &str = "/instances/{instance_id}/v3/access";
const TEST_EVENT_PATH: &str = "/instances/{instance_id}/v3/test_event";
const PLANS_PATH: &str = "/instances/{instance_id}/v3/plans";

/// Options for [`InstanceAdminService::get_instance_settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetInstanceSettingsOptions {
    /// Instance id.
    pub instance_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl GetInstanceSettingsOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::patch_instance_settings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchInstanceSettingsOptions {
    /// Instance id.
    pub instance_id: String,
    /// Patch operations; must not be empty.
    pub body: Vec<JsonPatchOperation>,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl PatchInstanceSettingsOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>, body: Vec<JsonPatchOperation>) -> Self {
        Self {
            instance_id: instance_id.into(),
            body,
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::get_instance_access`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetInstanceAccessOptions {
    /// Instance id.
    pub instance_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl GetInstanceAccessOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::post_instance_test_event`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostInstanceTestEventOptions {
    /// Instance id.
    pub instance_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl PostInstanceTestEventOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::get_instance_plans`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetInstancePlansOptions {
    /// Instance id.
    pub instance_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl GetInstancePlansOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::post_instance_plan`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostInstancePlanOptions {
    /// Instance id.
    pub instance_id: String,
    /// Name of the plan to attach, e.g. `Standard`.
    pub name: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl PostInstancePlanOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Options for [`InstanceAdminService::replace_instance_plan`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaceInstancePlanOptions {
    /// Instance id.
    pub instance_id: String,
    /// Name of the replacement plan.
    pub name: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl ReplaceInstancePlanOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Client for instance administration.
#[derive(Debug, Clone)]
pub struct InstanceAdminService {
    service: BaseService,
}

impl InstanceAdminService {
    /// Name used for external configuration, e.g. `INSTANCE_ADMIN_URL`.
    pub const SERVICE_NAME: &'static str = "instance_admin";

    /// Default service URL.
    pub const DEFAULT_SERVICE_URL: &'static str = "https://us-south.compliance.cloud.ibm.com";

    const GET_SETTINGS: Operation = Operation::new(Self::SERVICE_NAME, "GetSettings");
    const PATCH_SETTINGS: Operation = Operation::new(Self::SERVICE_NAME, "PatchSettings");
    const GET_ACCESS: Operation = Operation::new(Self::SERVICE_NAME, "GetInstanceAccess");
    const POST_TEST_EVENT: Operation = Operation::new(Self::SERVICE_NAME, "PostTestEvent");
    const GET_PLANS: Operation = Operation::new(Self::SERVICE_NAME, "GetInstancePlans");
    const POST_PLAN: Operation = Operation::new(Self::SERVICE_NAME, "PostInstancePlan");
    const REPLACE_PLAN: Operation = Operation::new(Self::SERVICE_NAME, "ReplaceInstancePlan");

    /// Returns a builder preset with the service name and default URL.
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new(Self::SERVICE_NAME).default_url(Self::DEFAULT_SERVICE_URL)
    }

    /// Creates a client with the default configuration.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> SccResult<Self> {
        Self::builder().authenticator(authenticator).build()
    }

    /// Returns the endpoint of `region`.
    pub fn get_service_url_for_region(region: &str) -> SccResult<&'static str> {
        regional_url(region)
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

    /// Calls [`Self::get_instance_settings_with_context`] with a background context.
    pub async fn get_instance_settings(
        &self,
        options: &GetInstanceSettingsOptions,
    ) -> SccResult<DetailedResponse<Settings>> {
        self.get_instance_settings_with_context(options, &RequestContext::background())
            .await
    }

    /// Gets the settings of an instance.
    #[instrument(skip_all, fields(operation = "GetSettings", instance_id = %options.instance_id))]
    pub async fn get_instance_settings_with_context(
        &self,
        options: &GetInstanceSettingsOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Settings>> {
        require("instance_id", &options.instance_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Get,
            SETTINGS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
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

    /// Calls [`Self::patch_instance_settings_with_context`] with a background context.
    pub async fn patch_instance_settings(
        &self,
        options: &PatchInstanceSettingsOptions,
    ) -> SccResult<DetailedResponse<Settings>> {
        self.patch_instance_settings_with_context(options, &RequestContext::background())
            .await
    }

    /// Applies a JSON Patch to the settings of an instance.
    #[instrument(skip_all, fields(operation = "PatchSettings", instance_id = %options.instance_id))]
    pub async fn patch_instance_settings_with_context(
        &self,
        options: &PatchInstanceSettingsOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Settings>> {
        require("instance_id", &options.instance_id)?;
        validate_patch(&options.body)?;

        let builder = self.service.request_builder(
            HttpMethod::Patch,
            SETTINGS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
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

    /// Calls [`Self::get_instance_access_with_context`] with a background context.
    pub async fn get_instance_access(
        &self,
        options: &GetInstanceAccessOptions,
    ) -> SccResult<DetailedResponse<InstanceAccess>> {
        self.get_instance_access_with_context(options, &RequestContext::background())
            .await
    }

    /// Gets the caller's access to an instance.
    #[instrument(skip_all, fields(operation = "GetInstanceAccess", instance_id = %options.instance_id))]
    pub async fn get_instance_access_with_context(
        &self,
        options: &GetInstanceAccessOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<InstanceAccess>> {
        require("instance_id", &options.instance_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Get,
            ACCESS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let request = Self::GET_ACCESS
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Calls [`Self::post_instance_test_event_with_context`] with a background context.
    pub async fn post_instance_test_event(
        &self,
        options: &PostInstanceTestEventOptions,
    ) -> SccResult<DetailedResponse<TestEvent>> {
        self.post_instance_test_event_with_context(options, &RequestContext::background())
            .await
    }

    /// Sends a test event for an instance.
    #[instrument(skip_all, fields(operation = "PostTestEvent", instance_id = %options.instance_id))]
    pub async fn post_instance_test_event_with_context(
        &self,
        options: &PostInstanceTestEventOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<TestEvent>> {
        require("instance_id", &options.instance_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Post,
            TEST_EVENT_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
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

    /// Calls [`Self::get_instance_plans_with_context`] with a background context.
    pub async fn get_instance_plans(
        &self,
        options: &GetInstancePlansOptions,
    ) -> SccResult<DetailedResponse<InstancePlans>> {
        self.get_instance_plans_with_context(options, &RequestContext::background())
            .await
    }

    /// Lists the plans of an instance.
    #[instrument(skip_all, fields(operation = "GetInstancePlans", instance_id = %options.instance_id))]
    pub async fn get_instance_plans_with_context(
        &self,
        options: &GetInstancePlansOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<InstancePlans>> {
        require("instance_id", &options.instance_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Get,
            PLANS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let request = Self::GET_PLANS
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Calls [`Self::post_instance_plan_with_context`] with a background context.
    pub async fn post_instance_plan(
        &self,
        options: &PostInstancePlanOptions,
    ) -> SccResult<DetailedResponse<InstancePlan>> {
        self.post_instance_plan_with_context(options, &RequestContext::background())
            .await
    }

    /// Attaches a plan to an instance.
    #[instrument(skip_all, fields(operation = "PostInstancePlan", instance_id = %options.instance_id))]
    pub async fn post_instance_plan_with_context(
        &self,
        options: &PostInstancePlanOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<InstancePlan>> {
        require("instance_id", &options.instance_id)?;
        require("name", &options.name)?;

        let builder = self.service.request_builder(
            HttpMethod::Post,
            PLANS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let body = PlanPrototype {
            name: options.name.clone(),
        };
        let request = Self::POST_PLAN
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .json_body(&body, CONTENT_TYPE_JSON)?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Calls [`Self::replace_instance_plan_with_context`] with a background context.
    pub async fn replace_instance_plan(
        &self,
        options: &ReplaceInstancePlanOptions,
    ) -> SccResult<DetailedResponse<InstancePlan>> {
        self.replace_instance_plan_with_context(options, &RequestContext::background())
            .await
    }

    /// Replaces the plan of an instance.
    #[instrument(skip_all, fields(operation = "ReplaceInstancePlan", instance_id = %options.instance_id))]
    pub async fn replace_instance_plan_with_context(
        &self,
        options: &ReplaceInstancePlanOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<InstancePlan>> {
        require("instance_id", &options.instance_id)?;
        require("name", &options.name)?;

        let builder = self.service.request_builder(
            HttpMethod::Put,
            PLANS_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let body = PlanPrototype {
            name: options.name.clone(),
        };
        let request = Self::REPLACE_PLAN
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .json_body(&body, CONTENT_TYPE_JSON)?
            .build()?;

        self.service.request(request, ctx).await
    }
}

impl From<BaseService> for InstanceAdminService {
    fn from(service: BaseService) -> Self {
        Self { service }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SccError;
    use crate::mocks::{fixtures, MockAuthenticator, MockResponse, MockTransport};
    use serde_json::json;

    fn client(transport: &Arc<MockTransport>) -> InstanceAdminService {
        InstanceAdminService::builder()
            .authenticator(Arc::new(MockAuthenticator::default()))
            .transport(transport.clone())
            .load_external_config(false)
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_url() {
        let service = client(&Arc::new(MockTransport::new()));
        assert_eq!(
            service.service_url(),
            "https://us-south.compliance.cloud.ibm.com"
        );
        assert_eq!(
            InstanceAdminService::get_service_url_for_region("eu-de").unwrap(),
            "https://eu.compliance.cloud.ibm.com"
        );
        assert!(InstanceAdminService::get_service_url_for_region("mars-1").is_err());
    }

    #[tokio::test]
    async fn test_get_instance_settings_path() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::settings());
        let service = client(&transport);

        let response = service
            .get_instance_settings(&GetInstanceSettingsOptions::new("abc"))
            .await
            .unwrap();

        assert!(response.result.unwrap().event_notifications.is_some());
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert_eq!(request.url.path(), "/instances/abc/v3/settings");
        assert_eq!(
            request.header("x-ibmcloud-sdk-analytics"),
            Some("service_name=instance_admin;service_version=V1;operation_id=GetSettings")
        );
    }

    #[tokio::test]
    async fn test_missing_instance_id_makes_no_request() {
        let transport = Arc::new(MockTransport::new());
        let service = client(&transport);

        let settings = service
            .get_instance_settings(&GetInstanceSettingsOptions::default())
            .await;
        let access = service
            .get_instance_access(&GetInstanceAccessOptions::new("   "))
            .await;
        let plans = service
            .get_instance_plans(&GetInstancePlansOptions::default())
            .await;

        for result in [settings.map(|_| ()), access.map(|_| ()), plans.map(|_| ())] {
            assert!(matches!(
                result,
                Err(SccError::Validation { field: Some(ref f), .. }) if f == "instance_id"
            ));
        }
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_patch_instance_settings() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&fixtures::settings());
        let service = client(&transport);

        service
            .patch_instance_settings(&PatchInstanceSettingsOptions::new(
                "abc",
                vec![JsonPatchOperation::remove("/event_notifications")],
            ))
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(
            request.header("content-type"),
            Some("application/json-patch+json")
        );
        let body: serde_json::Value = serde_json::from_slice(&request.body.unwrap()).unwrap();
        assert_eq!(body, json!([{"op": "remove", "path": "/event_notifications"}]));
    }

    #[tokio::test]
    async fn test_get_instance_access() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({
            "instance_id": "abc",
            "roles": {"view": ["dashboard"], "read": ["controls"], "update": ["settings"]}
        }));
        let service = client(&transport);

        let access = service
            .get_instance_access(&GetInstanceAccessOptions::new("abc"))
            .await
            .unwrap()
            .result
            .unwrap();

        let roles = access.roles.unwrap();
        assert!(roles.can_read("controls"));
        assert!(roles.can_update("settings"));
        assert!(roles.delete.is_empty());
        assert_eq!(
            transport.last_request().unwrap().url.path(),
            "/instances/abc/v3/access"
        );
    }

    #[tokio::test]
    async fn test_plans() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"plans": [{"id": "p1", "name": "Standard"}]}));
        transport.queue(MockResponse::json(&json!({"id": "p2", "name": "Trial"})).with_status(201));
        transport.queue_json(&json!({"id": "p3", "name": "Standard"}));
        let service = client(&transport);

        let plans = service
            .get_instance_plans(&GetInstancePlansOptions::new("abc"))
            .await
            .unwrap();
        assert_eq!(plans.result.unwrap().plans.len(), 1);

        let created = service
            .post_instance_plan(&PostInstancePlanOptions::new("abc", "Trial"))
            .await
            .unwrap();
        assert_eq!(created.status_code, 201);
        assert_eq!(created.result.unwrap().name.as_deref(), Some("Trial"));

        service
            .replace_instance_plan(&ReplaceInstancePlanOptions::new("abc", "Standard"))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[1].method, HttpMethod::Post);
        assert_eq!(requests[2].method, HttpMethod::Put);
        assert_eq!(requests[2].url.path(), "/instances/abc/v3/plans");
        assert_eq!(
            requests[2].body.as_deref(),
            Some(br#"{"name":"Standard"}"#.as_slice())
        );
    }

    #[tokio::test]
    async fn test_plan_name_required() {
        let transport = Arc::new(MockTransport::new());
        let service = client(&transport);

        let result = service
            .post_instance_plan(&PostInstancePlanOptions::new("abc", ""))
            .await;
        assert!(matches!(result, Err(SccError::Validation { .. })));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_post_instance_test_event() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&json!({"success": false}));
        let service = client(&transport);

        let response = service
            .post_instance_test_event(&PostInstanceTestEventOptions::new("abc"))
            .await
            .unwrap();

        assert_eq!(response.result, Some(TestEvent { success: false }));
        let request = transport.last_request().unwrap();
        assert_eq!(request.url.path(), "/instances/abc/v3/test_event");
        assert!(request.body.is_none());
    }
}
