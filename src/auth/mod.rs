//! Authentication module for the SCC client.
//!
//! An [`Authenticator`] decorates each outgoing request, typically with an
//! `Authorization` header. It is invoked once per attempt so token-based
//! authenticators can refresh between retries.

mod token;

pub use token::{TokenAuthenticator, TokenGrant, DEFAULT_IAM_URL, DEFAULT_VPC_URL};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use http::header::AUTHORIZATION;
use http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{props, ServiceProperties};
use crate::errors::{SccError, SccResult};
use crate::transport::HttpRequest;

/// Authenticator trait.
///
/// Implementations must only mutate request headers and must not retain the
/// request.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the authenticator type.
    fn auth_type(&self) -> AuthType;

    /// Validates the configuration. Called when the client is built.
    fn validate(&self) -> SccResult<()>;

    /// Adds credentials to `request`.
    async fn authenticate(&self, request: &mut HttpRequest) -> SccResult<()>;
}

/// Recognized authenticator types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    /// No credentials.
    NoAuth,
    /// HTTP basic authentication.
    Basic,
    /// Static bearer token.
    BearerToken,
    /// IAM API key exchange.
    Iam,
    /// Compute resource token exchange.
    Container,
    /// VPC instance identity exchange.
    Vpc,
    /// Cloud Pak for Data.
    Cp4d,
}

impl AuthType {
    /// Returns the canonical configuration value.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::NoAuth => "noauth",
            AuthType::Basic => "basic",
            AuthType::BearerToken => "bearertoken",
            AuthType::Iam => "iam",
            AuthType::Container => "container",
            AuthType::Vpc => "vpc",
            AuthType::Cp4d => "cp4d",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = SccError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noauth" => Ok(AuthType::NoAuth),
            "basic" => Ok(AuthType::Basic),
            "bearertoken" => Ok(AuthType::BearerToken),
            "iam" => Ok(AuthType::Iam),
            "container" => Ok(AuthType::Container),
            "vpc" => Ok(AuthType::Vpc),
            "cp4d" => Ok(AuthType::Cp4d),
            other => Err(SccError::configuration(format!(
                "unrecognized authentication type: {other}"
            ))),
        }
    }
}

/// Authenticator that adds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuthAuthenticator;

#[async_trait]
impl Authenticator for NoAuthAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::NoAuth
    }

    fn validate(&self) -> SccResult<()> {
        Ok(())
    }

    async fn authenticate(&self, _request: &mut HttpRequest) -> SccResult<()> {
        Ok(())
    }
}

/// HTTP basic authenticator.
pub struct BasicAuthenticator {
    username: String,
    password: SecretString,
}

impl BasicAuthenticator {
    /// Creates a new basic authenticator.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::new(password.into()),
        }
    }

    fn header_value(&self) -> SccResult<HeaderValue> {
        let credentials = format!("{}:{}", self.username, self.password.expose_secret());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        sensitive_header(&format!("Basic {encoded}"))
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::Basic
    }

    fn validate(&self) -> SccResult<()> {
        check_credential("username", &self.username)?;
        check_credential("password", self.password.expose_secret())
    }

    async fn authenticate(&self, request: &mut HttpRequest) -> SccResult<()> {
        request.headers.insert(AUTHORIZATION, self.header_value()?);
        Ok(())
    }
}

impl fmt::Debug for BasicAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthenticator")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Static bearer token authenticator.
pub struct BearerTokenAuthenticator {
    token: SecretString,
}

impl BearerTokenAuthenticator {
    /// Creates a new bearer token authenticator.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::new(token.into()),
        }
    }

    /// Replaces the token. Callers own refreshing it.
    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = SecretString::new(token.into());
    }
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    fn auth_type(&self) -> AuthType {
        AuthType::BearerToken
    }

    fn validate(&self) -> SccResult<()> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(SccError::AuthConfig {
                message: "bearer token cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    async fn authenticate(&self, request: &mut HttpRequest) -> SccResult<()> {
        let value = sensitive_header(&format!("Bearer {}", self.token.expose_secret()))?;
        request.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl fmt::Debug for BearerTokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenAuthenticator")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Builds an authenticator from external service properties.
///
/// `AUTH_TYPE` is case-insensitive. When it is absent and an `APIKEY` is
/// present, IAM is assumed.
pub fn authenticator_from_properties(
    properties: &ServiceProperties,
) -> SccResult<Arc<dyn Authenticator>> {
    let auth_type = match properties.get(props::AUTH_TYPE) {
        Some(value) => value.parse::<AuthType>()?,
        None if properties.get(props::APIKEY).is_some() => AuthType::Iam,
        None => {
            return Err(SccError::configuration(format!(
                "no authenticator configured for service '{}'",
                properties.service_name()
            )))
        }
    };

    let required = |prop: &str| {
        properties.get(prop).map(str::to_string).ok_or_else(|| {
            SccError::configuration(format!(
                "{auth_type} authentication requires property {prop}"
            ))
        })
    };

    let authenticator: Arc<dyn Authenticator> = match auth_type {
        AuthType::NoAuth => Arc::new(NoAuthAuthenticator),
        AuthType::Basic => Arc::new(BasicAuthenticator::new(
            required(props::USERNAME)?,
            required(props::PASSWORD)?,
        )),
        AuthType::BearerToken => {
            Arc::new(BearerTokenAuthenticator::new(required(props::BEARER_TOKEN)?))
        }
        AuthType::Iam | AuthType::Container | AuthType::Vpc | AuthType::Cp4d => {
            Arc::new(TokenAuthenticator::from_properties(auth_type, properties)?)
        }
    };

    authenticator.validate()?;
    Ok(authenticator)
}

/// Rejects empty credentials and values wrapped in braces or quotes, which
/// usually means a template placeholder was never filled in.
pub(crate) fn check_credential(name: &str, value: &str) -> SccResult<()> {
    if value.trim().is_empty() {
        return Err(SccError::AuthConfig {
            message: format!("{name} cannot be empty"),
        });
    }
    let bad = |c: char| matches!(c, '{' | '}' | '"');
    if value.starts_with(bad) || value.ends_with(bad) {
        return Err(SccError::AuthConfig {
            message: format!(
                "{name} cannot start or end with '{{', '}}' or '\"'; remove any surrounding braces or quotes"
            ),
        });
    }
    Ok(())
}

pub(crate) fn sensitive_header(value: &str) -> SccResult<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| SccError::AuthConfig {
        message: "credentials contain characters not allowed in a header".to_string(),
    })?;
    header.set_sensitive(true);
    Ok(header)
}
