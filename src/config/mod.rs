//! Configuration module for the SCC client.
//!
//! Resolves the service URL, gzip, TLS and retry settings with the precedence
//! explicit builder value > environment > credentials file > built-in default.

pub mod loader;
pub mod url;

pub use self::loader::{env_prefix, props, ServiceProperties};
pub use self::url::{regional_url, resolve_template, validate_service_url, UrlTemplate};

use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::errors::{SccError, SccResult};
use crate::resilience::RetryConfig;

/// Default request timeout (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolved configuration record of a service client.
///
/// Cloned along with the client; clones share nothing mutable.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Name used for external configuration lookup and analytics.
    pub service_name: String,
    /// Base URL; empty disables the service.
    pub service_url: String,
    /// Headers added to every request.
    pub default_headers: HeaderMap,
    /// Compress non-empty request bodies with gzip.
    pub enable_gzip: bool,
    /// Skip TLS verification. Only for testing.
    pub disable_ssl_verification: bool,
    /// Request timeout applied by the default transport.
    pub timeout: Duration,
    /// Retry engine settings.
    pub retry: RetryConfig,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder(service_name: impl Into<String>) -> ServiceConfigBuilder {
        ServiceConfigBuilder::new(service_name)
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug, Clone)]
pub struct ServiceConfigBuilder {
    service_name: String,
    service_url: Option<String>,
    default_url: String,
    enable_gzip: Option<bool>,
    disable_ssl_verification: Option<bool>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    headers: Vec<(String, String)>,
    load_external_config: bool,
}

impl ServiceConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_url: None,
            default_url: String::new(),
            enable_gzip: None,
            disable_ssl_verification: None,
            timeout: None,
            retry: None,
            headers: Vec::new(),
            load_external_config: true,
        }
    }

    /// Sets the service name used for external configuration.
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Sets the service URL explicitly.
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }

    /// Sets the built-in default URL.
    pub fn default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = url.into();
        self
    }

    pub(crate) fn has_service_url(&self) -> bool {
        self.service_url.is_some()
    }

    /// Enables or disables gzip request compression.
    pub fn enable_gzip(mut self, enabled: bool) -> Self {
        self.enable_gzip = Some(enabled);
        self
    }

    /// Disables TLS verification.
    pub fn disable_ssl_verification(mut self, disabled: bool) -> Self {
        self.disable_ssl_verification = Some(disabled);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Adds a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Controls whether environment variables and the credentials file are read.
    pub fn load_external_config(mut self, load: bool) -> Self {
        self.load_external_config = load;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> SccResult<ServiceConfig> {
        self.build_with_properties().map(|(config, _)| config)
    }

    /// Builds the configuration and returns the external properties it used.
    pub fn build_with_properties(self) -> SccResult<(ServiceConfig, ServiceProperties)> {
        if self.service_name.trim().is_empty() {
            return Err(SccError::configuration("service name cannot be empty"));
        }

        let properties = if self.load_external_config {
            ServiceProperties::load(&self.service_name)?
        } else {
            ServiceProperties::from_map(&self.service_name, Default::default())
        };

        let url = match self.service_url {
            Some(url) => url,
            None => properties
                .get(props::URL)
                .map_or(self.default_url, str::to_string),
        };
        let service_url = validate_service_url(&url)?;

        let enable_gzip = match self.enable_gzip {
            Some(enabled) => enabled,
            None => properties.get_bool(props::ENABLE_GZIP)?.unwrap_or(false),
        };

        let disable_ssl_verification = match self.disable_ssl_verification {
            Some(disabled) => disabled,
            None => properties.get_bool(props::DISABLE_SSL)?.unwrap_or(false),
        };

        let retry = match self.retry {
            Some(retry) => retry,
            None => retry_from_properties(&properties)?,
        };

        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                SccError::configuration(format!("invalid default header name: {name}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                SccError::configuration(format!("invalid value for default header {name}"))
            })?;
            default_headers.insert(name, value);
        }

        let config = ServiceConfig {
            service_name: self.service_name,
            service_url,
            default_headers,
            enable_gzip,
            disable_ssl_verification,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            retry,
        };

        Ok((config, properties))
    }
}

fn retry_from_properties(properties: &ServiceProperties) -> SccResult<RetryConfig> {
    if !properties.get_bool(props::ENABLE_RETRIES)?.unwrap_or(false) {
        return Ok(RetryConfig::no_retries());
    }

    let mut retry = RetryConfig::new();
    if let Some(max) = properties.get_u64(props::MAX_RETRIES)? {
        retry = retry.max_retries(u32::try_from(max).unwrap_or(u32::MAX));
    }
    if let Some(secs) = properties.get_u64(props::RETRY_INTERVAL)? {
        retry = retry.max_interval(Duration::from_secs(secs));
    }
    Ok(retry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn offline(name: &str) -> ServiceConfigBuilder {
        ServiceConfig::builder(name).load_external_config(false)
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = offline("admin_settings")
            .default_url("https://us-south.compliance.cloud.ibm.com/")
            .build()
            .unwrap();

        assert_eq!(config.service_url, "https://us-south.compliance.cloud.ibm.com");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(!config.enable_gzip);
        assert!(!config.retry.is_enabled());
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = offline("admin_settings")
            .default_url("https://default.example.com")
            .service_url("https://explicit.example.com")
            .build()
            .unwrap();

        assert_eq!(config.service_url, "https://explicit.example.com");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = offline("admin_settings").service_url("ftp://x").build();
        assert!(matches!(result, Err(SccError::Configuration { .. })));
    }

    #[test]
    fn test_invalid_default_header_rejected() {
        let result = offline("admin_settings")
            .header("bad header", "x")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_retry_from_properties() {
        let values: HashMap<String, String> = [
            ("ENABLE_RETRIES", "true"),
            ("MAX_RETRIES", "2"),
            ("RETRY_INTERVAL", "5"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let properties = ServiceProperties::from_map("admin", values);

        let retry = retry_from_properties(&properties).unwrap();
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.max_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_retries_disabled_without_property() {
        let properties = ServiceProperties::from_map("admin", HashMap::new());
        assert!(!retry_from_properties(&properties).unwrap().is_enabled());
    }
}
