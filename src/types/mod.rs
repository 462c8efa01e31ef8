//! Type definitions for the SCC API.
//!
//! Payload records for settings, JSON Patch documents, custom rules, plans
//! and access. Unknown fields are ignored on decode; optional fields are
//! omitted from the wire when unset.

pub mod access;
pub mod patch;
pub mod plans;
pub mod rules;
pub mod settings;

pub use access::{InstanceAccess, RoleAccess};
pub use patch::{JsonPatchOperation, PatchOp};
pub use plans::{InstancePlan, InstancePlans, PlanPrototype};
pub use rules::{
    AdditionalTargetAttribute, Import, Page, PageNext, Parameter, RequiredConfig, Rule,
    RulePrototype, Rules, Target,
};
pub use settings::{EventNotifications, ObjectStorage, Settings, TestEvent};
