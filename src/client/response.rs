//! Response wrapper returned by every operation.

use bytes::Bytes;
use http::header::ETAG;
use http::HeaderMap;

use crate::transport::HttpResponse;

/// Status, headers, raw body and decoded result of one operation call.
#[derive(Debug, Clone)]
pub struct DetailedResponse<T = serde_json::Value> {
    /// HTTP status code.
    pub status_code: u16,
    /// Response headers; lookups are case-insensitive.
    pub headers: HeaderMap,
    /// Decoded body; `None` when the body was empty.
    pub result: Option<T>,
    /// Undecoded body.
    pub raw_body: Bytes,
}

impl<T> DetailedResponse<T> {
    /// Returns a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the `ETag` header, used as `if_match` on updates.
    pub fn etag(&self) -> Option<&str> {
        self.headers.get(ETAG).and_then(|v| v.to_str().ok())
    }

    /// Returns the decoded result.
    pub fn result(&self) -> Option<&T> {
        self.result.as_ref()
    }

    /// Consumes the response and returns the decoded result.
    pub fn into_result(self) -> Option<T> {
        self.result
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Replaces the result, keeping status, headers and body.
    pub(crate) fn with_result<U>(self, result: Option<U>) -> DetailedResponse<U> {
        DetailedResponse {
            status_code: self.status_code,
            headers: self.headers,
            result,
            raw_body: self.raw_body,
        }
    }
}

impl From<HttpResponse> for DetailedResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status_code: response.status,
            headers: response.headers,
            result: None,
            raw_body: response.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_etag_and_case_insensitive_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("ETag", HeaderValue::from_static("W/\"abc\""));
        headers.insert("X-Request-Id", HeaderValue::from_static("req-1"));

        let response: DetailedResponse = DetailedResponse {
            status_code: 200,
            headers,
            result: None,
            raw_body: Bytes::new(),
        };

        assert_eq!(response.etag(), Some("W/\"abc\""));
        assert_eq!(response.header("x-request-id"), Some("req-1"));
        assert!(response.is_success());
    }
}
