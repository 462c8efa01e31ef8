//! Token-exchange authenticators: IAM, container, VPC and Cloud Pak for Data.
//!
//! Tokens are fetched lazily, cached and refreshed once 80% of their
//! lifetime has elapsed. Concurrent callers wait on a single fetch.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use super::{check_credential, sensitive_header, AuthType, Authenticator};
use crate::config::{props, ServiceProperties};
use crate::errors::{ProblemDocument, SccError, SccResult};
use crate::transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportConfig,
};

/// Default IAM token endpoint host.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com";

/// Default VPC instance metadata endpoint.
pub const DEFAULT_VPC_URL: &str = "http://169.254.169.254";

const DEFAULT_CR_TOKEN_FILENAME: &str = "/var/run/secrets/tokens/vault-token";
const IAM_APIKEY_GRANT: &str = "urn:ibm:params:oauth:grant-type:apikey";
const IAM_CR_TOKEN_GRANT: &str = "urn:ibm:params:oauth:grant-type:cr-token";
const VPC_METADATA_VERSION: &str = "2022-03-01";
const VPC_INSTANCE_TOKEN_LIFETIME_SECS: u64 = 300;
const FALLBACK_TOKEN_LIFETIME: Duration = Duration::from_secs(60 * 60);

/// Credential exchanged for an access token.
pub enum TokenGrant {
    /// IAM API key.
    Iam {
        /// The API key.
        apikey: SecretString,
    },
    /// Compute resource token read from a file, bound to a trusted profile.
    Container {
        /// Path of the compute resource token file.
        cr_token_filename: PathBuf,
        /// Trusted profile name.
        profile_name: Option<String>,
        /// Trusted profile id.
        profile_id: Option<String>,
    },
    /// VPC instance identity, optionally bound to a trusted profile.
    Vpc {
        /// Trusted profile CRN.
        profile_crn: Option<String>,
        /// Trusted profile id.
        profile_id: Option<String>,
    },
    /// Cloud Pak for Data username with a password or an API key.
    Cp4d {
        /// Username.
        username: String,
        /// Password.
        password: Option<SecretString>,
        /// API key.
        apikey: Option<SecretString>,
    },
}

impl TokenGrant {
    fn auth_type(&self) -> AuthType {
        match self {
            TokenGrant::Iam { .. } => AuthType::Iam,
            TokenGrant::Container { .. } => AuthType::Container,
            TokenGrant::Vpc { .. } => AuthType::Vpc,
            TokenGrant::Cp4d { .. } => AuthType::Cp4d,
        }
    }

    fn default_url(&self) -> &'static str {
        match self {
            TokenGrant::Iam { .. } | TokenGrant::Container { .. } => DEFAULT_IAM_URL,
            TokenGrant::Vpc { .. } => DEFAULT_VPC_URL,
            TokenGrant::Cp4d { .. } => "",
        }
    }
}

impl fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenGrant::Iam { .. } => f
                .debug_struct("Iam")
                .field("apikey", &"[REDACTED]")
                .finish(),
            TokenGrant::Container {
                cr_token_filename,
                profile_name,
                profile_id,
            } => f
                .debug_struct("Container")
                .field("cr_token_filename", cr_token_filename)
                .field("profile_name", profile_name)
                .field("profile_id", profile_id)
                .finish(),
            TokenGrant::Vpc {
                profile_crn,
                profile_id,
            } => f
                .debug_struct("Vpc")
                .field("profile_crn", profile_crn)
                .field("profile_id", profile_id)
                .finish(),
            TokenGrant::Cp4d { username, .. } => f
                .debug_struct("Cp4d")
                .field("username", username)
                .field("credential", &"[REDACTED]")
                .finish(),
        }
    }
}

struct CachedToken {
    access_token: SecretString,
    refresh_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn new(access_token: String, expires_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        let lifetime = (expires_at - now).max(chrono::Duration::zero());
        Self {
            access_token: SecretString::new(access_token),
            refresh_at: now + lifetime * 4 / 5,
            expires_at,
        }
    }

    fn is_fresh(&self) -> bool {
        Utc::now() < self.refresh_at
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    expiration: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VpcTokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Cp4dTokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    exp: Option<i64>,
}

/// Authenticator that exchanges a credential for a short-lived bearer token.
pub struct TokenAuthenticator {
    grant: TokenGrant,
    url: String,
    transport: Arc<dyn HttpTransport>,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenAuthenticator {
    /// Creates an authenticator with its own reqwest transport.
    pub fn new(grant: TokenGrant) -> SccResult<Self> {
        Self::with_tls_verification(grant, true)
    }

    fn with_tls_verification(grant: TokenGrant, verify: bool) -> SccResult<Self> {
        let config = TransportConfig {
            disable_ssl_verification: !verify,
            ..TransportConfig::default()
        };
        let transport = ReqwestTransport::new(config).map_err(|e| SccError::AuthConfig {
            message: format!("unable to create token client: {e}"),
        })?;
        Ok(Self::with_transport(grant, Arc::new(transport)))
    }

    /// Creates an authenticator that fetches tokens through `transport`.
    pub fn with_transport(grant: TokenGrant, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            url: grant.default_url().to_string(),
            grant,
            transport,
            cache: Mutex::new(None),
        }
    }

    /// IAM API key authenticator.
    pub fn iam(apikey: impl Into<String>) -> SccResult<Self> {
        Self::new(TokenGrant::Iam {
            apikey: SecretString::new(apikey.into()),
        })
    }

    /// Overrides the token endpoint base URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the token endpoint base URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Builds a token authenticator from external properties.
    pub fn from_properties(auth_type: AuthType, properties: &ServiceProperties) -> SccResult<Self> {
        let get = |prop: &str| properties.get(prop).map(str::to_string);
        let secret = |prop: &str| get(prop).map(SecretString::new);

        let grant = match auth_type {
            AuthType::Iam => TokenGrant::Iam {
                apikey: secret(props::APIKEY).ok_or_else(|| {
                    SccError::configuration("iam authentication requires property APIKEY")
                })?,
            },
            AuthType::Container => TokenGrant::Container {
                cr_token_filename: get(props::CR_TOKEN_FILENAME)
                    .map_or_else(|| PathBuf::from(DEFAULT_CR_TOKEN_FILENAME), PathBuf::from),
                profile_name: get(props::IAM_PROFILE_NAME),
                profile_id: get(props::IAM_PROFILE_ID),
            },
            AuthType::Vpc => TokenGrant::Vpc {
                profile_crn: get(props::IAM_PROFILE_CRN),
                profile_id: get(props::IAM_PROFILE_ID),
            },
            AuthType::Cp4d => TokenGrant::Cp4d {
                username: get(props::USERNAME).unwrap_or_default(),
                password: secret(props::PASSWORD),
                apikey: secret(props::APIKEY),
            },
            other => {
                return Err(SccError::configuration(format!(
                    "{other} is not a token-based authentication type"
                )))
            }
        };

        let verify = !properties.get_bool(props::AUTH_DISABLE_SSL)?.unwrap_or(false);
        let mut authenticator = Self::with_tls_verification(grant, verify)?;
        if let Some(url) = properties.get(props::AUTH_URL) {
            authenticator = authenticator.with_url(url);
        }
        Ok(authenticator)
    }

    /// Returns a valid access token, fetching a new one when needed.
    pub async fn token(&self) -> SccResult<SecretString> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(SecretString::new(cached.access_token.expose_secret().clone()));
            }
        }

        let fetched = match self.fetch().await {
            Ok(token) => token,
            // A token that is due for refresh but not yet expired is still usable.
            Err(err) => match cache.as_ref() {
                Some(cached) if Utc::now() < cached.expires_at && err.is_retryable() => {
                    tracing::warn!(error = %err, "Token refresh failed; using cached token");
                    return Ok(SecretString::new(cached.access_token.expose_secret().clone()));
                }
                _ => return Err(err),
            },
        };

        let token = SecretString::new(fetched.access_token.expose_secret().clone());
        *cache = Some(fetched);
        Ok(token)
    }

    async fn fetch(&self) -> SccResult<CachedToken> {
        tracing::debug!(auth_type = %self.grant.auth_type(), url = %self.url, "Requesting access token");

        match &self.grant {
            TokenGrant::Iam { apikey } => {
                self.iam_exchange(&[
                    ("grant_type", IAM_APIKEY_GRANT),
                    ("apikey", apikey.expose_secret()),
                ])
                .await
            }
            TokenGrant::Container {
                cr_token_filename,
                profile_name,
                profile_id,
            } => {
                let cr_token = tokio::fs::read_to_string(cr_token_filename)
                    .await
                    .map_err(|e| SccError::AuthConfig {
                        message: format!(
                            "unable to read compute resource token from {}: {e}",
                            cr_token_filename.display()
                        ),
                    })?;
                let mut form = vec![
                    ("grant_type", IAM_CR_TOKEN_GRANT),
                    ("cr_token", cr_token.trim()),
                ];
                if let Some(name) = profile_name {
                    form.push(("profile_name", name.as_str()));
                }
                if let Some(id) = profile_id {
                    form.push(("profile_id", id.as_str()));
                }
                self.iam_exchange(&form).await
            }
            TokenGrant::Vpc {
                profile_crn,
                profile_id,
            } => self.vpc_exchange(profile_crn.as_deref(), profile_id.as_deref()).await,
            TokenGrant::Cp4d {
                username,
                password,
                apikey,
            } => {
                let mut body = serde_json::Map::new();
                body.insert("username".to_string(), username.clone().into());
                if let Some(password) = password {
                    body.insert("password".to_string(), password.expose_secret().clone().into());
                }
                if let Some(apikey) = apikey {
                    body.insert("api_key".to_string(), apikey.expose_secret().clone().into());
                }
                let response = self
                    .post_json(&format!("{}/v1/authorize", self.url), None, &body.into())
                    .await?;
                let parsed: Cp4dTokenResponse = parse_token_body(&response)?;
                let expires_at = jwt_expiry(&parsed.token)
                    .unwrap_or_else(|| Utc::now() + lifetime(FALLBACK_TOKEN_LIFETIME));
                Ok(CachedToken::new(parsed.token, expires_at))
            }
        }
    }

    async fn iam_exchange(&self, form: &[(&str, &str)]) -> SccResult<CachedToken> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form.iter())
            .finish();

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: parse_url(&format!("{}/identity/token", self.url))?,
            headers,
            body: Some(Bytes::from(body)),
        };
        let response = self.send(request).await?;
        let parsed: IamTokenResponse = parse_token_body(&response)?;

        let expires_at = parsed
            .expiration
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| parsed.expires_in.map(|secs| Utc::now() + chrono::Duration::seconds(secs)))
            .unwrap_or_else(|| Utc::now() + lifetime(FALLBACK_TOKEN_LIFETIME));
        Ok(CachedToken::new(parsed.access_token, expires_at))
    }

    async fn vpc_exchange(
        &self,
        profile_crn: Option<&str>,
        profile_id: Option<&str>,
    ) -> SccResult<CachedToken> {
        let mut headers = HeaderMap::new();
        headers.insert("Metadata-Flavor", HeaderValue::from_static("ibm"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let instance_request = HttpRequest {
            method: HttpMethod::Put,
            url: parse_url(&format!(
                "{}/instance_identity/v1/token?version={VPC_METADATA_VERSION}",
                self.url
            ))?,
            headers: headers.clone(),
            body: Some(Bytes::from(
                serde_json::json!({ "expires_in": VPC_INSTANCE_TOKEN_LIFETIME_SECS }).to_string(),
            )),
        };
        let instance: VpcTokenResponse = parse_token_body(&self.send(instance_request).await?)?;

        let body = match (profile_crn, profile_id) {
            (Some(crn), _) => serde_json::json!({ "trusted_profile": { "crn": crn } }),
            (None, Some(id)) => serde_json::json!({ "trusted_profile": { "id": id } }),
            (None, None) => serde_json::json!({}),
        };
        let bearer = sensitive_header(&format!("Bearer {}", instance.access_token))?;
        let response = self
            .post_json(
                &format!(
                    "{}/instance_identity/v1/iam_token?version={VPC_METADATA_VERSION}",
                    self.url
                ),
                Some(bearer),
                &body,
            )
            .await?;
        let parsed: VpcTokenResponse = parse_token_body(&response)?;

        let expires_at = Utc::now()
            + parsed
                .expires_in
                .map_or_else(|| lifetime(FALLBACK_TOKEN_LIFETIME), chrono::Duration::seconds);
        Ok(CachedToken::new(parsed.access_token, expires_at))
    }

    async fn post_json(
        &self,
        url: &str,
        authorization: Option<HeaderValue>,
        body: &serde_json::Value,
    ) -> SccResult<HttpResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(value) = authorization {
            headers.insert(AUTHORIZATION, value);
        }
        if self.grant.auth_type() == AuthType::Vpc {
            headers.insert("Metadata-Flavor", HeaderValue::from_static("ibm"));
        }

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: parse_url(url)?,
            headers,
            body: Some(Bytes::from(body.to_string())),
        };
        self.send(request).await
    }

    async fn send(&self, request: HttpRequest) -> SccResult<HttpResponse> {
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| SccError::AuthTransport {
                message: format!("token request failed: {e}"),
            })?;

        if response.is_success() {
            return Ok(response);
        }

        let detail = ProblemDocument::parse(&response.body)
            .and_then(|p| p.summary())
            .or_else(|| error_message_field(&response.body))
            .unwrap_or_else(|| "no details".to_string());
        let message = format!(
            "token endpoint returned HTTP {}: {detail}",
            response.status
        );

        if response.status == 429 || response.status >= 500 {
            Err(SccError::AuthTransport { message })
        } else {
            Err(SccError::AuthConfig { message })
        }
    }
}

#[async_trait]
impl Authenticator for TokenAuthenticator {
    fn auth_type(&self) -> AuthType {
        self.grant.auth_type()
    }

    fn validate(&self) -> SccResult<()> {
        match &self.grant {
            TokenGrant::Iam { apikey } => check_credential("apikey", apikey.expose_secret())?,
            TokenGrant::Container {
                profile_name,
                profile_id,
                ..
            } => {
                if profile_name.is_none() && profile_id.is_none() {
                    return Err(SccError::AuthConfig {
                        message: "container authentication requires a profile name or id"
                            .to_string(),
                    });
                }
            }
            TokenGrant::Vpc {
                profile_crn,
                profile_id,
            } => {
                if profile_crn.is_some() && profile_id.is_some() {
                    return Err(SccError::AuthConfig {
                        message: "at most one of profile CRN or profile id may be set".to_string(),
                    });
                }
            }
            TokenGrant::Cp4d {
                username,
                password,
                apikey,
            } => {
                check_credential("username", username)?;
                match (password, apikey) {
                    (Some(p), None) => check_credential("password", p.expose_secret())?,
                    (None, Some(k)) => check_credential("apikey", k.expose_secret())?,
                    _ => {
                        return Err(SccError::AuthConfig {
                            message: "exactly one of password or apikey must be set".to_string(),
                        })
                    }
                }
            }
        }

        if self.url.trim().is_empty() {
            return Err(SccError::AuthConfig {
                message: format!("{} authentication requires a token URL", self.auth_type()),
            });
        }
        Url::parse(&self.url).map_err(|e| SccError::AuthConfig {
            message: format!("invalid token URL '{}': {e}", self.url),
        })?;
        Ok(())
    }

    async fn authenticate(&self, request: &mut HttpRequest) -> SccResult<()> {
        let token = self.token().await?;
        let value = sensitive_header(&format!("Bearer {}", token.expose_secret()))?;
        request.headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("grant", &self.grant)
            .field("url", &self.url)
            .finish()
    }
}

fn parse_url(url: &str) -> SccResult<Url> {
    Url::parse(url).map_err(|e| SccError::AuthConfig {
        message: format!("invalid token URL '{url}': {e}"),
    })
}

fn parse_token_body<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> SccResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| SccError::AuthTransport {
        message: format!("malformed token response: {e}"),
    })
}

fn error_message_field(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("errorMessage")
        .or_else(|| value.get("_messageCode_"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: JwtClaims = serde_json::from_slice(&decoded).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

fn lifetime(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::hours(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockResponse, MockTransport};
    use std::collections::HashMap;
    use std::io::Write;

    fn request() -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: Url::parse("https://us-south.compliance.cloud.ibm.com/settings").unwrap(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    fn iam_token(token: &str, expires_in: i64) -> serde_json::Value {
        serde_json::json!({
            "access_token": token,
            "refresh_token": "not-used",
            "token_type": "Bearer",
            "expires_in": expires_in,
            "expiration": Utc::now().timestamp() + expires_in,
        })
    }

    fn iam(transport: &Arc<MockTransport>) -> TokenAuthenticator {
        TokenAuthenticator::with_transport(
            TokenGrant::Iam {
                apikey: SecretString::new("my-apikey".to_string()),
            },
            transport.clone(),
        )
        .with_url("https://iam.example.com/")
    }

    #[tokio::test]
    async fn test_iam_exchange_and_cache() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&iam_token("token-1", 3600));
        let auth = iam(&transport);

        let mut first = request();
        auth.authenticate(&mut first).await.unwrap();
        let mut second = request();
        auth.authenticate(&mut second).await.unwrap();

        assert_eq!(first.header("authorization"), Some("Bearer token-1"));
        assert_eq!(second.header("authorization"), Some("Bearer token-1"));
        assert_eq!(transport.request_count(), 1);

        let token_request = transport.last_request().unwrap();
        assert_eq!(token_request.url.as_str(), "https://iam.example.com/identity/token");
        assert_eq!(
            token_request.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        let body = String::from_utf8(token_request.body.unwrap().to_vec()).unwrap();
        assert!(body.contains("grant_type=urn%3Aibm%3Aparams%3Aoauth%3Agrant-type%3Aapikey"));
        assert!(body.contains("apikey=my-apikey"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&iam_token("stale", 0));
        transport.queue_json(&iam_token("fresh", 3600));
        let auth = iam(&transport);

        auth.token().await.unwrap();
        let token = auth.token().await.unwrap();

        assert_eq!(token.expose_secret(), "fresh");
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_token_endpoint_errors_are_classified() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(
            MockResponse::json(&serde_json::json!({"errorMessage": "Provided API key could not be found"}))
                .with_status(400),
        );
        transport.queue_error(503, "IAM unavailable");
        transport.queue_connection_error("connection refused");
        let auth = iam(&transport);

        let err = auth.token().await.unwrap_err();
        assert!(matches!(err, SccError::AuthConfig { .. }));
        assert!(err.to_string().contains("could not be found"));

        assert!(matches!(
            auth.token().await.unwrap_err(),
            SccError::AuthTransport { .. }
        ));
        assert!(auth.token().await.unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_container_reads_cr_token() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cr-token-value").unwrap();

        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&iam_token("container-token", 3600));
        let auth = TokenAuthenticator::with_transport(
            TokenGrant::Container {
                cr_token_filename: file.path().to_path_buf(),
                profile_name: Some("my-profile".to_string()),
                profile_id: None,
            },
            transport.clone(),
        );
        auth.validate().unwrap();

        let token = auth.token().await.unwrap();
        assert_eq!(token.expose_secret(), "container-token");

        let body = String::from_utf8(transport.last_request().unwrap().body.unwrap().to_vec()).unwrap();
        assert!(body.contains("cr_token=cr-token-value"));
        assert!(body.contains("profile_name=my-profile"));
    }

    #[tokio::test]
    async fn test_vpc_two_step_exchange() {
        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({"access_token": "instance-token"}));
        transport.queue_json(&serde_json::json!({"access_token": "iam-token", "expires_in": 3600}));
        let auth = TokenAuthenticator::with_transport(
            TokenGrant::Vpc {
                profile_crn: None,
                profile_id: Some("profile-id".to_string()),
            },
            transport.clone(),
        );

        let token = auth.token().await.unwrap();
        assert_eq!(token.expose_secret(), "iam-token");

        let requests = transport.requests();
        assert_eq!(requests[0].method, HttpMethod::Put);
        assert_eq!(requests[0].url.path(), "/instance_identity/v1/token");
        assert_eq!(requests[0].header("metadata-flavor"), Some("ibm"));
        assert_eq!(requests[1].url.path(), "/instance_identity/v1/iam_token");
        assert_eq!(requests[1].header("authorization"), Some("Bearer instance-token"));
    }

    #[tokio::test]
    async fn test_cp4d_uses_jwt_expiry() {
        let exp = Utc::now().timestamp() + 7200;
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(format!(r#"{{"sub":"admin","exp":{exp}}}"#));
        let jwt = format!("eyJhbGciOiJIUzI1NiJ9.{payload}.sig");

        let transport = Arc::new(MockTransport::new());
        transport.queue_json(&serde_json::json!({ "token": jwt }));
        let auth = TokenAuthenticator::with_transport(
            TokenGrant::Cp4d {
                username: "admin".to_string(),
                password: Some(SecretString::new("pw".to_string())),
                apikey: None,
            },
            transport.clone(),
        )
        .with_url("https://cp4d.example.com");
        auth.validate().unwrap();

        let token = auth.token().await.unwrap();
        assert_eq!(token.expose_secret(), &jwt);
        assert_eq!(jwt_expiry(&jwt).unwrap().timestamp(), exp);
        assert_eq!(transport.last_request().unwrap().url.path(), "/v1/authorize");
    }

    #[test]
    fn test_validation() {
        let transport: Arc<dyn HttpTransport> = Arc::new(MockTransport::new());

        let empty_key = TokenAuthenticator::with_transport(
            TokenGrant::Iam {
                apikey: SecretString::new(String::new()),
            },
            transport.clone(),
        );
        assert!(matches!(empty_key.validate(), Err(SccError::AuthConfig { .. })));

        let no_url = TokenAuthenticator::with_transport(
            TokenGrant::Cp4d {
                username: "admin".to_string(),
                password: Some(SecretString::new("pw".to_string())),
                apikey: None,
            },
            transport.clone(),
        );
        assert!(no_url.validate().is_err());

        let both_profiles = TokenAuthenticator::with_transport(
            TokenGrant::Vpc {
                profile_crn: Some("crn".to_string()),
                profile_id: Some("id".to_string()),
            },
            transport,
        );
        assert!(both_profiles.validate().is_err());
    }

    #[test]
    fn test_from_properties_sets_url() {
        let values: HashMap<String, String> = [
            ("APIKEY", "key"),
            ("AUTH_URL", "https://iam.test.cloud.ibm.com/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let properties = ServiceProperties::from_map("admin", values);

        let auth = TokenAuthenticator::from_properties(AuthType::Iam, &properties).unwrap();
        assert_eq!(auth.url(), "https://iam.test.cloud.ibm.com");
        assert!(format!("{auth:?}").contains("[REDACTED]"));
    }
}
