//! Instance plan types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pricing plan attached to an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePlan {
    /// Plan identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Plan name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// When the plan took effect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,

    /// Who changed the plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Plans of an instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstancePlans {
    /// The plans.
    #[serde(default)]
    pub plans: Vec<InstancePlan>,
}

/// Request body for creating or replacing a plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlanPrototype {
    /// Plan name.
    pub name: String,
}
