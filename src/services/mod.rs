//! Service clients for the SCC API.
//!
//! Each operation has a default form that runs with a background context and
//! a `*_with_context` form that honors the caller's cancellation and deadline.

mod admin_settings;
mod common;
mod config_rules;
mod instance_admin;

pub use admin_settings::{
    AdminSettingsService, GetSettingsOptions, PatchSettingsOptions, PostTestEventOptions,
};
pub use common::{ANALYTICS_HEADER, CORRELATION_ID_HEADER, REQUEST_ID_HEADER};
pub use config_rules::{
    ConfigRulesService, CreateRuleOptions, DeleteRuleOptions, GetRuleOptions, ListRulesOptions,
    ReplaceRuleOptions,
};
pub use instance_admin::{
    GetInstanceAccessOptions, GetInstancePlansOptions, GetInstanceSettingsOptions,
    InstanceAdminService, PatchInstanceSettingsOptions, PostInstancePlanOptions,
    PostInstanceTestEventOptions, ReplaceInstancePlanOptions,
};
