//! Shared setup for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use scc_client::auth::BearerTokenAuthenticator;
use scc_client::{AdminSettingsService, ConfigRulesService, InstanceAdminService, RetryConfig};
use wiremock::MockServer;

pub const TOKEN: &str = "test-bearer-token";

pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn bearer() -> Arc<BearerTokenAuthenticator> {
    Arc::new(BearerTokenAuthenticator::new(TOKEN))
}

pub fn fast_retries(max_retries: u32) -> RetryConfig {
    RetryConfig::new()
        .max_retries(max_retries)
        .initial_interval(Duration::from_millis(10))
        .max_interval(Duration::from_millis(50))
        .jitter(false)
}

pub fn admin_settings(server: &MockServer) -> AdminSettingsService {
    AdminSettingsService::builder()
        .service_url(server.uri())
        .authenticator(bearer())
        .load_external_config(false)
        .build()
        .expect("Failed to build admin settings client")
}

pub fn instance_admin(server: &MockServer) -> InstanceAdminService {
    InstanceAdminService::builder()
        .service_url(server.uri())
        .authenticator(bearer())
        .load_external_config(false)
        .build()
        .expect("Failed to build instance admin client")
}

pub fn config_rules(server: &MockServer) -> ConfigRulesService {
    ConfigRulesService::builder()
        .service_url(server.uri())
        .authenticator(bearer())
        .load_external_config(false)
        .build()
        .expect("Failed to build config rules client")
}
