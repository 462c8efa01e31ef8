//! Observability module for the SCC client.
//!
//! Logging setup and helpers that keep credentials out of log output.

mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};

use std::borrow::Cow;
use std::sync::OnceLock;

use http::HeaderMap;
use regex::Regex;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-auth-token",
];

/// Returns `value`, or a placeholder if `name` carries credentials.
pub fn redact_header<'a>(name: &str, value: &'a str) -> Cow<'a, str> {
    if SENSITIVE_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
    {
        Cow::Borrowed(REDACTED)
    } else {
        Cow::Borrowed(value)
    }
}

/// Renders headers for logging with credentials replaced.
pub fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            (
                name.as_str().to_string(),
                redact_header(name.as_str(), value).into_owned(),
            )
        })
        .collect()
}

/// Masks bearer/basic credentials and key-like fields in free text.
pub fn redact_text(text: &str) -> Cow<'_, str> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();

    let Some((scheme, field)) = PATTERNS
        .get_or_init(|| {
            let scheme = Regex::new(r"(?i)\b(bearer|basic)\s+[A-Za-z0-9._~+/=-]+").ok()?;
            let field = Regex::new(
                r#"(?i)("?(?:apikey|api_key|password|access_token|refresh_token|cr_token)"?\s*[:=]\s*"?)[^"&\s,}]+"#,
            )
            .ok()?;
            Some((scheme, field))
        })
        .as_ref()
    else {
        return Cow::Borrowed(text);
    };

    let masked = scheme.replace_all(text, "$1 [REDACTED]");
    if !field.is_match(&masked) {
        return masked;
    }
    Cow::Owned(field.replace_all(&masked, "${1}[REDACTED]").into_owned())
}
