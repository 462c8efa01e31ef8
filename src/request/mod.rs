//! Request construction.
//!
//! A [`RequestBuilder`] collects the method, resolved URL, headers, query and
//! body of one operation call and is consumed by [`RequestBuilder::build`].

use std::collections::HashMap;
use std::io::Write;

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use url::Url;

use crate::errors::{SccError, SccResult};
use crate::transport::{HttpMethod, HttpRequest};

/// `Content-Type` of JSON bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// `Content-Type` of JSON Patch bodies.
pub const CONTENT_TYPE_JSON_PATCH: &str = "application/json-patch+json";

/// Characters left as-is in a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Substitutes `{name}` placeholders in `template` with percent-encoded
/// values from `params`.
///
/// A placeholder whose parameter is missing or blank is a validation error.
pub fn encode_path(template: &str, params: &[(&str, &str)]) -> SccResult<String> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let close = rest[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| SccError::validation(format!("unterminated placeholder in path {template}")))?;

        resolved.push_str(&rest[..open]);
        let name = &rest[open + 1..close];
        let value = params
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                SccError::validation_field(name, format!("path parameter '{name}' must be set"))
            })?;
        resolved.extend(utf8_percent_encode(value, PATH_SEGMENT));
        rest = &rest[close + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

/// Builder for a single HTTP request.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: HttpMethod,
    url: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<Bytes>,
    gzip: bool,
}

impl RequestBuilder {
    /// Creates a builder for `method` against `service_url`.
    pub fn new(method: HttpMethod, service_url: &str) -> SccResult<Self> {
        if service_url.trim().is_empty() {
            return Err(SccError::configuration(
                "service URL missing; set it with set_service_url or the URL property",
            ));
        }
        Ok(Self {
            method,
            url: service_url.trim_end_matches('/').to_string(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            gzip: false,
        })
    }

    /// Appends the resolved path template to the URL.
    pub fn resolve_path(mut self, template: &str, params: &[(&str, &str)]) -> SccResult<Self> {
        let path = encode_path(template, params)?;
        if !path.is_empty() && !path.starts_with('/') {
            self.url.push('/');
        }
        self.url.push_str(&path);
        Ok(self)
    }

    /// Sets a header; the last value set for a name wins.
    pub fn header(mut self, name: &str, value: &str) -> SccResult<Self> {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| SccError::validation_field(name, format!("invalid header name: {name}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| SccError::validation_field(name, format!("invalid value for header {name}")))?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Sets every header in `headers`.
    pub fn headers(self, headers: &HashMap<String, String>) -> SccResult<Self> {
        headers
            .iter()
            .try_fold(self, |builder, (name, value)| builder.header(name, value))
    }

    /// Sets a header if `value` is present.
    pub fn header_opt(self, name: &str, value: Option<&str>) -> SccResult<Self> {
        match value {
            Some(value) => self.header(name, value),
            None => Ok(self),
        }
    }

    /// Sets headers that are already validated.
    pub fn typed_headers(mut self, headers: &HeaderMap) -> Self {
        for (name, value) in headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    /// Appends a query parameter if `value` is present.
    pub fn query_opt<V: ToString>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Serializes `body` as JSON and sets `Content-Type`.
    ///
    /// Object keys come out sorted; unset optional fields are absent.
    pub fn json_body<T: Serialize + ?Sized>(
        mut self,
        body: &T,
        content_type: &'static str,
    ) -> SccResult<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            SccError::validation(format!("unable to serialize request body: {e}"))
        })?;
        let encoded = serde_json::to_vec(&value).map_err(|e| {
            SccError::validation(format!("unable to serialize request body: {e}"))
        })?;

        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        self.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// Enables gzip compression of a non-empty body.
    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    /// Consumes the builder and returns the request.
    pub fn build(mut self) -> SccResult<HttpRequest> {
        let mut url = Url::parse(&self.url)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }

        if !self.method.has_body() {
            self.body = None;
            self.headers.remove(CONTENT_TYPE);
        }

        let body = match self.body.take() {
            Some(body) if self.gzip && !body.is_empty() => {
                self.headers
                    .insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                Some(gzip(&body)?)
            }
            other => {
                self.headers.remove(CONTENT_ENCODING);
                other
            }
        };

        Ok(HttpRequest {
            method: self.method,
            url,
            headers: self.headers,
            body,
        })
    }
}

fn gzip(data: &[u8]) -> SccResult<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SccError::validation(format!("gzip compression failed: {e}")))?;
    encoder
        .finish()
        .map(Bytes::from)
        .map_err(|e| SccError::validation(format!("gzip finalization failed: {e}")))
}
