//! Custom rule types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// A configuration rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Rule description.
    pub description: String,

    /// Rule identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `user_defined` or `system_defined`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,

    /// Rule version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Owning account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    /// Creator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// Creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,

    /// Last modifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,

    /// Last modification time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,

    /// Parameters the rule imports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<Import>,

    /// Resources the rule targets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,

    /// Condition the targeted resources must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_config: Option<RequiredConfig>,

    /// Labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Request body for creating or replacing a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RulePrototype {
    /// Rule description.
    pub description: String,

    /// Resources the rule targets.
    pub target: Target,

    /// Condition the targeted resources must satisfy.
    pub required_config: RequiredConfig,

    /// Rule version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Parameters the rule imports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<Import>,

    /// Labels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

/// Target of a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Target service, e.g. `cloud-object-storage`.
    pub service_name: String,

    /// Resource kind within the service, e.g. `bucket`.
    pub resource_kind: String,

    /// Display name of the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_display_name: Option<String>,

    /// Extra selectors narrowing the targeted resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_target_attributes: Option<Vec<AdditionalTargetAttribute>>,
}

/// A target selector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdditionalTargetAttribute {
    /// Attribute name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Comparison operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Operand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A rule condition. Either a leaf comparison or an `and`/`or` of
/// nested conditions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequiredConfig {
    /// Condition description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// All nested conditions must hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<RequiredConfig>>,

    /// At least one nested condition must hold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<RequiredConfig>>,

    /// Property compared by a leaf condition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,

    /// Comparison operator, e.g. `is_true` or `num_equals`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,

    /// Operand; its JSON type depends on the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl RequiredConfig {
    /// A leaf condition.
    pub fn property(property: impl Into<String>, operator: impl Into<String>) -> Self {
        Self {
            property: Some(property.into()),
            operator: Some(operator.into()),
            ..Default::default()
        }
    }

    /// Sets the operand.
    #[must_use]
    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Parameters imported by a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// The parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
}

/// A rule parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value type, e.g. `string` or `numeric`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub parameter_type: Option<String>,
}

/// A page of rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Rules {
    /// Requested page size.
    pub limit: Option<i64>,
    /// Total number of rules.
    pub total_count: Option<i64>,
    /// Link to the first page.
    pub first: Option<Page>,
    /// Link to the next page; absent on the last page.
    pub next: Option<PageNext>,
    /// The rules on this page.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Pagination link.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Page {
    /// Link target.
    pub href: Option<String>,
}

/// Pagination link to the next page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PageNext {
    /// Link target.
    pub href: Option<String>,
    /// Start token for the next page.
    pub start: Option<String>,
}

impl Rules {
    /// Returns the `start` token of the next page, if there is one.
    ///
    /// Uses `next.start` when present, otherwise the `start` query parameter
    /// of `next.href`.
    pub fn next_start(&self) -> Option<String> {
        let next = self.next.as_ref()?;
        if let Some(start) = next.start.as_deref().filter(|s| !s.is_empty()) {
            return Some(start.to_string());
        }

        let href = next.href.as_deref()?;
        let url = Url::parse(href)
            .or_else(|_| Url::parse("http://placeholder.invalid").and_then(|base| base.join(href)))
            .ok()?;
        url.query_pairs()
            .find(|(k, _)| k == "start")
            .map(|(_, v)| v.into_owned())
    }

    /// Returns true if there is no further page.
    pub fn is_last_page(&self) -> bool {
        self.next_start().is_none()
    }
}
