//! Security and Compliance Center Client Library
//!
//! An async Rust client for the Security and Compliance Center (SCC) REST
//! API: admin settings, instance administration and custom configuration
//! rules.
//!
//! # Features
//!
//! - **Typed operations**: one options struct and one typed response per endpoint
//! - **Authentication**: IAM, container, VPC and CP4D token exchange, basic and bearer
//! - **Resilience**: opt-in retries with exponential backoff and `Retry-After`
//! - **Cancellation**: deadlines and cancellation tokens on every call
//! - **Configuration**: builder values, environment variables and credentials files
//! - **Observability**: `tracing` spans per operation with redacted credentials
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scc_client::{auth::TokenAuthenticator, ConfigRulesService, ListRulesOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let authenticator = Arc::new(TokenAuthenticator::iam("my-api-key")?);
//!     let service = ConfigRulesService::new(authenticator)?;
//!
//!     let options = ListRulesOptions::new("my-instance-id").type_query("user_defined");
//!     let response = service.list_rules(&options).await?;
//!
//!     for rule in response.into_result().unwrap_or_default().rules {
//!         println!("{}", rule.description);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Deadlines
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use scc_client::{AdminSettingsService, GetSettingsOptions, RequestContext};
//!
//! # async fn run(service: AdminSettingsService) -> scc_client::SccResult<()> {
//! let ctx = RequestContext::with_timeout(Duration::from_secs(5));
//! let settings = service
//!     .get_settings_with_context(&GetSettingsOptions::default(), &ctx)
//!     .await?;
//! println!("status {}", settings.status_code);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod errors;
pub mod observability;
pub mod request;
pub mod resilience;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{BaseService, DetailedResponse, ServiceBuilder};
pub use config::{ServiceConfig, ServiceProperties, UrlTemplate};
pub use context::RequestContext;
pub use errors::{ProblemDocument, SccError, SccResult};
pub use resilience::RetryConfig;

pub use services::{
    AdminSettingsService, ConfigRulesService, CreateRuleOptions, DeleteRuleOptions,
    GetInstanceAccessOptions, GetInstancePlansOptions, GetInstanceSettingsOptions, GetRuleOptions,
    GetSettingsOptions, InstanceAdminService, ListRulesOptions, PatchInstanceSettingsOptions,
    PatchSettingsOptions, PostInstancePlanOptions, PostInstanceTestEventOptions,
    PostTestEventOptions, ReplaceInstancePlanOptions, ReplaceRuleOptions,
};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
