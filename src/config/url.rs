//! Service URL templates and regional endpoints.
//!
//! Template values are substituted verbatim. They are assumed to be URL-safe;
//! a value containing `/`, `?`, `#` or spaces produces an unspecified URL.

use std::collections::HashMap;

use url::Url;

use crate::errors::{SccError, SccResult};

/// Regional endpoints shared by services that support them.
const REGIONAL_URLS: &[(&str, &str)] = &[
    ("us-south", "https://us.compliance.cloud.ibm.com"),
    ("us-east", "https://us.compliance.cloud.ibm.com"),
    ("eu-de", "https://eu.compliance.cloud.ibm.com"),
    ("eu-fr2", "https://eu-fr2.compliance.cloud.ibm.com"),
    ("ca-tor", "https://ca-tor.compliance.cloud.ibm.com"),
];

/// Returns the endpoint for `region`.
pub fn regional_url(region: &str) -> SccResult<&'static str> {
    REGIONAL_URLS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, url)| *url)
        .ok_or_else(|| SccError::configuration(format!("unknown region: {region}")))
}

/// A parameterized base URL such as
/// `https://{region}.compliance.cloud.ibm.com/instances/{instance_id}/v3`.
#[derive(Debug, Clone, Copy)]
pub struct UrlTemplate {
    template: &'static str,
    defaults: &'static [(&'static str, &'static str)],
}

impl UrlTemplate {
    /// Creates a template with its whitelist of variables and their defaults.
    pub const fn new(
        template: &'static str,
        defaults: &'static [(&'static str, &'static str)],
    ) -> Self {
        Self { template, defaults }
    }

    /// Returns the raw template.
    pub fn template(&self) -> &'static str {
        self.template
    }

    /// Returns the known variable names.
    pub fn variables(&self) -> impl Iterator<Item = &'static str> {
        self.defaults.iter().map(|(k, _)| *k)
    }

    /// Resolves the template with every variable at its default.
    pub fn default_url(&self) -> SccResult<String> {
        self.resolve(&HashMap::new())
    }

    /// Resolves the template, overriding defaults with `overrides`.
    pub fn resolve(&self, overrides: &HashMap<String, String>) -> SccResult<String> {
        let defaults: HashMap<String, String> = self
            .defaults
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        resolve_template(self.template, &defaults, overrides)
    }
}

/// Expands `{name}` placeholders in `template`.
///
/// Every key in `overrides` must also be a key of `defaults`. The result must
/// be an absolute `http` or `https` URL.
pub fn resolve_template(
    template: &str,
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> SccResult<String> {
    let mut vars = defaults.clone();
    for (key, value) in overrides {
        if !defaults.contains_key(key) {
            return Err(SccError::configuration(format!(
                "unknown variable '{key}' for URL template {template}"
            )));
        }
        vars.insert(key.clone(), value.clone());
    }

    let unresolved =
        || SccError::configuration(format!("unresolved variable in URL template: {template}"));

    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let close = rest[open..].find('}').map(|i| open + i).ok_or_else(unresolved)?;
        let literal = &rest[..open];
        if literal.contains('}') {
            return Err(unresolved());
        }
        resolved.push_str(literal);
        let value = vars.get(&rest[open + 1..close]).ok_or_else(unresolved)?;
        resolved.push_str(value);
        rest = &rest[close + 1..];
    }
    if rest.contains('}') {
        return Err(unresolved());
    }
    resolved.push_str(rest);

    validate_service_url(&resolved)
}

/// Validates a service URL and strips trailing slashes.
///
/// An empty string is accepted and means the service is disabled.
pub fn validate_service_url(url: &str) -> SccResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    let parsed = Url::parse(trimmed)?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(SccError::configuration(format!(
            "service URL must be an absolute http or https URL: {trimmed}"
        )));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: UrlTemplate = UrlTemplate::new(
        "https://{region}.compliance.cloud.ibm.com/instances/{instance_id}/v3",
        &[("region", "us-south"), ("instance_id", "instance_id")],
    );

    fn overrides(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_default_url() {
        assert_eq!(
            TEMPLATE.default_url().unwrap(),
            "https://us-south.compliance.cloud.ibm.com/instances/instance_id/v3"
        );
    }

    #[test]
    fn test_known_overrides_substitute() {
        let url = TEMPLATE
            .resolve(&overrides(&[("region", "eu-de"), ("instance_id", "abc123")]))
            .unwrap();
        assert_eq!(
            url,
            "https://eu-de.compliance.cloud.ibm.com/instances/abc123/v3"
        );
    }

    #[test]
    fn test_unknown_variable_rejected() {
        let err = TEMPLATE
            .resolve(&overrides(&[("zone", "1")]))
            .unwrap_err();
        assert!(matches!(err, SccError::Configuration { .. }));
        assert!(err.to_string().contains("unknown variable"));
    }

    #[test]
    fn test_unresolved_placeholder_rejected() {
        let err = resolve_template(
            "https://{region}.example.com/{missing}",
            &overrides(&[("region", "x")]),
            &HashMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, SccError::Configuration { .. }));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let defaults = overrides(&[("host", "example.com"), ("path", "v3")]);

        // Repeat so a hash-order dependent result would show up.
        for _ in 0..16 {
            let url = resolve_template(
                "https://{host}/{path}",
                &defaults,
                &overrides(&[("path", "{host}")]),
            )
            .unwrap();
            assert_eq!(url, "https://example.com/{host}");
        }
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        assert!(validate_service_url("ftp://files.example.com").is_err());
        assert!(validate_service_url("not a url").is_err());
    }

    #[test]
    fn test_empty_url_disables() {
        assert_eq!(validate_service_url("").unwrap(), "");
        assert_eq!(
            validate_service_url("https://example.com/api/").unwrap(),
            "https://example.com/api"
        );
    }

    #[test]
    fn test_regional_urls() {
        assert_eq!(
            regional_url("us-south").unwrap(),
            regional_url("us-east").unwrap()
        );
        assert_eq!(
            regional_url("eu-de").unwrap(),
            "https://eu.compliance.cloud.ibm.com"
        );
        assert!(regional_url("mars-north").is_err());
    }
}
