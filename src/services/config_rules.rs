//! Custom configuration rules.
//!
//! Rules live under `/instances/{instance_id}/v3/rules`. Updates use
//! optimistic concurrency: read the rule, take its ETag from
//! [`DetailedResponse::etag`], and pass it back as
//! [`ReplaceRuleOptions::if_match`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use super::common::{require, require_some, Operation};
use crate::auth::Authenticator;
use crate::client::{BaseService, DetailedResponse, ServiceBuilder};
use crate::config::regional_url;
use crate::context::RequestContext;
use crate::errors::{SccError, SccResult};
use crate::request::CONTENT_TYPE_JSON;
use crate::transport::HttpMethod;
use crate::types::{Import, RequiredConfig, Rule, RulePrototype, Rules, Target};

const RULES_PATH: &str = "/instances/{instance_id}/v3/rules";
const RULE_PATH: &str = "/instances/{instance_id}/v3/rules/{rule_id}";

/// Options for [`ConfigRulesService::list_rules`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRulesOptions {
    /// Instance id.
    pub instance_id: String,
    /// Rule type filter, `system_defined` or `user_defined`.
    pub type_query: Option<String>,
    /// Free-text search over rule descriptions.
    pub search: Option<String>,
    /// Only rules targeting this service.
    pub service_name: Option<String>,
    /// Page size.
    pub limit: Option<i64>,
    /// Start token of the page to fetch.
    pub start: Option<String>,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl ListRulesOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }

    /// Sets the rule type filter.
    pub fn type_query(mut self, type_query: impl Into<String>) -> Self {
        self.type_query = Some(type_query.into());
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for [`ConfigRulesService::create_rule`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateRuleOptions {
    /// Instance id.
    pub instance_id: String,
    /// Rule description.
    pub description: String,
    /// Resource the rule applies to.
    pub target: Option<Target>,
    /// Condition the resource must satisfy.
    pub required_config: Option<RequiredConfig>,
    /// Rule version.
    pub version: Option<String>,
    /// Parameters the rule imports.
    pub import: Option<Import>,
    /// Labels.
    pub labels: Option<Vec<String>>,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

/// Options for [`ConfigRulesService::get_rule`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetRuleOptions {
    /// Instance id.
    pub instance_id: String,
    /// Rule id.
    pub rule_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl GetRuleOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            rule_id: rule_id.into(),
            ..Default::default()
        }
    }
}

/// Options for [`ConfigRulesService::replace_rule`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaceRuleOptions {
    /// Instance id.
    pub instance_id: String,
    /// Rule id.
    pub rule_id: String,
    /// ETag of the rule being replaced, sent as `If-Match`.
    pub if_match: String,
    /// Rule description.
    pub description: String,
    /// Resource the rule applies to.
    pub target: Option<Target>,
    /// Condition the resource must satisfy.
    pub required_config: Option<RequiredConfig>,
    /// Rule version.
    pub version: Option<String>,
    /// Parameters the rule imports.
    pub import: Option<Import>,
    /// Labels.
    pub labels: Option<Vec<String>>,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

/// Options for [`ConfigRulesService::delete_rule`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteRuleOptions {
    /// Instance id.
    pub instance_id: String,
    /// Rule id.
    pub rule_id: String,
    /// Correlation id forwarded as `X-Correlation-Id`.
    pub x_correlation_id: Option<String>,
    /// Request id forwarded as `X-Request-Id`.
    pub x_request_id: Option<String>,
    /// Custom request headers.
    pub headers: HashMap<String, String>,
}

impl DeleteRuleOptions {
    /// Creates options with the required fields set.
    pub fn new(instance_id: impl Into<String>, rule_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            rule_id: rule_id.into(),
            ..Default::default()
        }
    }
}

fn rule_body(
    description: &str,
    target: Option<&Target>,
    required_config: Option<&RequiredConfig>,
    version: Option<&String>,
    import: Option<&Import>,
    labels: Option<&Vec<String>>,
) -> SccResult<RulePrototype> {
    require("description", description)?;
    let target = require_some("target", target)?;
    require("target.service_name", &target.service_name)?;
    require("target.resource_kind", &target.resource_kind)?;
    let required_config = require_some("required_config", required_config)?;

    Ok(RulePrototype {
        description: description.to_string(),
        target: target.clone(),
        required_config: required_config.clone(),
        version: version.cloned(),
        import: import.cloned(),
        labels: labels.cloned(),
    })
}

/// Client for the config rules API.
#[derive(Debug, Clone)]
pub struct ConfigRulesService {
    service: BaseService,
}

impl ConfigRulesService {
    /// Name used for external configuration, e.g. `CONFIG_RULES_URL`.
    pub const SERVICE_NAME: &'static str = "config_rules";

    /// Default service URL.
    pub const DEFAULT_SERVICE_URL: &'static str = "https://us-south.compliance.cloud.ibm.com";

    /// Upper bound on pages fetched by [`list_all_rules`](Self::list_all_rules).
    const MAX_PAGES: usize = 1000;

    const LIST_RULES: Operation = Operation::new(Self::SERVICE_NAME, "ListRules");
    const CREATE_RULE: Operation = Operation::new(Self::SERVICE_NAME, "CreateRule");
    const GET_RULE: Operation = Operation::new(Self::SERVICE_NAME, "GetRule");
    const REPLACE_RULE: Operation = Operation::new(Self::SERVICE_NAME, "ReplaceRule");
    const DELETE_RULE: Operation = Operation::new(Self::SERVICE_NAME, "DeleteRule");

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

    /// Lists one page of rules.
    pub async fn list_rules(
        &self,
        options: &ListRulesOptions,
    ) -> SccResult<DetailedResponse<Rules>> {
        self.list_rules_with_context(options, &RequestContext::background())
            .await
    }

    /// Lists one page of rules under `ctx`.
    #[instrument(skip_all, fields(operation = "ListRules", instance_id = %options.instance_id))]
    pub async fn list_rules_with_context(
        &self,
        options: &ListRulesOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Rules>> {
        require("instance_id", &options.instance_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Get,
            RULES_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let request = Self::LIST_RULES
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .query_opt("type_query", options.type_query.as_deref())
            .query_opt("search", options.search.as_deref())
            .query_opt("service_name", options.service_name.as_deref())
            .query_opt("limit", options.limit)
            .query_opt("start", options.start.as_deref())
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Lists every rule, following `next` links from the page `options`
    /// selects.
    #[instrument(skip_all, fields(operation = "ListRules", instance_id = %options.instance_id))]
    pub async fn list_all_rules(
        &self,
        options: &ListRulesOptions,
        ctx: &RequestContext,
    ) -> SccResult<Vec<Rule>> {
        self.collect_rule_pages(options, ctx, Self::MAX_PAGES).await
    }

    async fn collect_rule_pages(
        &self,
        options: &ListRulesOptions,
        ctx: &RequestContext,
        max_pages: usize,
    ) -> SccResult<Vec<Rule>> {
        let mut page_options = options.clone();
        let mut rules = Vec::new();

        for _ in 0..max_pages {
            let page = self
                .list_rules_with_context(&page_options, ctx)
                .await?
                .into_result()
                .unwrap_or_default();

            let next = page.next_start();
            rules.extend(page.rules);

            match next {
                Some(start) if page_options.start.as_deref() != Some(start.as_str()) => {
                    tracing::debug!(start = %start, fetched = rules.len(), "Fetching next page of rules");
                    page_options.start = Some(start);
                }
                _ => return Ok(rules),
            }
        }

        // The server kept handing out fresh page tokens.
        Err(SccError::decode(format!(
            "rule listing did not finish within {max_pages} pages"
        )))
    }

    /// Creates a custom rule.
    pub async fn create_rule(&self, options: &CreateRuleOptions) -> SccResult<DetailedResponse<Rule>> {
        self.create_rule_with_context(options, &RequestContext::background())
            .await
    }

    /// Creates a custom rule under `ctx`.
    #[instrument(skip_all, fields(operation = "CreateRule", instance_id = %options.instance_id))]
    pub async fn create_rule_with_context(
        &self,
        options: &CreateRuleOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Rule>> {
        require("instance_id", &options.instance_id)?;
        let body = rule_body(
            &options.description,
            options.target.as_ref(),
            options.required_config.as_ref(),
            options.version.as_ref(),
            options.import.as_ref(),
            options.labels.as_ref(),
        )?;

        let builder = self.service.request_builder(
            HttpMethod::Post,
            RULES_PATH,
            &[("instance_id", &options.instance_id)],
        )?;
        let request = Self::CREATE_RULE
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

    /// Gets a rule. The response carries its ETag.
    pub async fn get_rule(&self, options: &GetRuleOptions) -> SccResult<DetailedResponse<Rule>> {
        self.get_rule_with_context(options, &RequestContext::background())
            .await
    }

    /// Gets a rule under `ctx`.
    #[instrument(skip_all, fields(operation = "GetRule", rule_id = %options.rule_id))]
    pub async fn get_rule_with_context(
        &self,
        options: &GetRuleOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Rule>> {
        require("instance_id", &options.instance_id)?;
        require("rule_id", &options.rule_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Get,
            RULE_PATH,
            &[
                ("instance_id", &options.instance_id),
                ("rule_id", &options.rule_id),
            ],
        )?;
        let request = Self::GET_RULE
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Replaces a rule if its ETag still matches `if_match`.
    pub async fn replace_rule(
        &self,
        options: &ReplaceRuleOptions,
    ) -> SccResult<DetailedResponse<Rule>> {
        self.replace_rule_with_context(options, &RequestContext::background())
            .await
    }

    /// Replaces a rule under `ctx`.
    #[instrument(skip_all, fields(operation = "ReplaceRule", rule_id = %options.rule_id))]
    pub async fn replace_rule_with_context(
        &self,
        options: &ReplaceRuleOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse<Rule>> {
        require("instance_id", &options.instance_id)?;
        require("rule_id", &options.rule_id)?;
        require("if_match", &options.if_match)?;
        let body = rule_body(
            &options.description,
            options.target.as_ref(),
            options.required_config.as_ref(),
            options.version.as_ref(),
            options.import.as_ref(),
            options.labels.as_ref(),
        )?;

        let builder = self.service.request_builder(
            HttpMethod::Put,
            RULE_PATH,
            &[
                ("instance_id", &options.instance_id),
                ("rule_id", &options.rule_id),
            ],
        )?;
        let request = Self::REPLACE_RULE
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .header("If-Match", &options.if_match)?
            .json_body(&body, CONTENT_TYPE_JSON)?
            .build()?;

        self.service.request(request, ctx).await
    }

    /// Deletes a rule. Succeeds with an empty body.
    pub async fn delete_rule(&self, options: &DeleteRuleOptions) -> SccResult<DetailedResponse> {
        self.delete_rule_with_context(options, &RequestContext::background())
            .await
    }

    /// Deletes a rule under `ctx`.
    #[instrument(skip_all, fields(operation = "DeleteRule", rule_id = %options.rule_id))]
    pub async fn delete_rule_with_context(
        &self,
        options: &DeleteRuleOptions,
        ctx: &RequestContext,
    ) -> SccResult<DetailedResponse> {
        require("instance_id", &options.instance_id)?;
        require("rule_id", &options.rule_id)?;

        let builder = self.service.request_builder(
            HttpMethod::Delete,
            RULE_PATH,
            &[
                ("instance_id", &options.instance_id),
                ("rule_id", &options.rule_id),
            ],
        )?;
        let request = Self::DELETE_RULE
            .apply_headers(
                builder,
                &options.headers,
                options.x_correlation_id.as_deref(),
                options.x_request_id.as_deref(),
            )?
            .build()?;

        self.service.request_no_content(request, ctx).await
    }
}

impl From<BaseService> for ConfigRulesService {
    fn from(service: BaseService) -> Self {
        Self { service }
    }
}
