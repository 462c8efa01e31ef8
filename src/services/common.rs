//! Pieces shared by the service clients.

use std::collections::HashMap;

use crate::errors::{SccError, SccResult};
use crate::request::RequestBuilder;
use crate::types::JsonPatchOperation;

/// Header carrying service name, version and operation id.
pub const ANALYTICS_HEADER: &str = "X-IBMCloud-SDK-Analytics";

/// Optional correlation id header.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

/// Optional request id header.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const SERVICE_VERSION: &str = "V1";

/// Identifies one operation for analytics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Operation {
    pub service_name: &'static str,
    pub operation_id: &'static str,
}

impl Operation {
    pub(crate) const fn new(service_name: &'static str, operation_id: &'static str) -> Self {
        Self {
            service_name,
            operation_id,
        }
    }

    /// Applies caller headers, then the SDK headers, then the tracing ids.
    pub(crate) fn apply_headers(
        self,
        builder: RequestBuilder,
        custom: &HashMap<String, String>,
        correlation_id: Option<&str>,
        request_id: Option<&str>,
    ) -> SccResult<RequestBuilder> {
        let analytics = format!(
            "service_name={};service_version={SERVICE_VERSION};operation_id={}",
            self.service_name, self.operation_id
        );

        builder
            .headers(custom)?
            .header(ANALYTICS_HEADER, &analytics)?
            .header("Accept", "application/json")?
            .header_opt(CORRELATION_ID_HEADER, correlation_id)?
            .header_opt(REQUEST_ID_HEADER, request_id)
    }
}

/// Fails unless `value` has a non-whitespace character.
pub(crate) fn require(field: &str, value: &str) -> SccResult<()> {
    if value.trim().is_empty() {
        return Err(SccError::validation_field(
            field,
            format!("{field} must be set"),
        ));
    }
    Ok(())
}

/// Fails unless `value` is present.
pub(crate) fn require_some<'a, T>(field: &str, value: Option<&'a T>) -> SccResult<&'a T> {
    value.ok_or_else(|| SccError::validation_field(field, format!("{field} must be set")))
}

/// Fails unless `body` is a non-empty list of valid patch operations.
pub(crate) fn validate_patch(body: &[JsonPatchOperation]) -> SccResult<()> {
    if body.is_empty() {
        return Err(SccError::validation_field(
            "body",
            "at least one patch operation is required",
        ));
    }
    body.iter().try_for_each(JsonPatchOperation::validate)
}
