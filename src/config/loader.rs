//! External configuration: environment variables and the credentials file.
//!
//! Keys have the form `{SERVICE_NAME}_{PROPERTY}`, e.g. `ADMIN_SETTINGS_URL`.
//! Environment variables take precedence over the credentials file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{SccError, SccResult};

/// Environment variable naming the credentials file.
pub const CREDENTIALS_FILE_ENV: &str = "IBM_CREDENTIALS_FILE";

/// File name searched for in the working and home directories.
pub const DEFAULT_CREDENTIALS_FILE_NAME: &str = "ibm-credentials.env";

/// Property suffixes.
pub mod props {
    /// Service URL override.
    pub const URL: &str = "URL";
    /// Authenticator type.
    pub const AUTH_TYPE: &str = "AUTH_TYPE";
    /// IAM API key.
    pub const APIKEY: &str = "APIKEY";
    /// Basic/CP4D username.
    pub const USERNAME: &str = "USERNAME";
    /// Basic/CP4D password.
    pub const PASSWORD: &str = "PASSWORD";
    /// Static bearer token.
    pub const BEARER_TOKEN: &str = "BEARER_TOKEN";
    /// Token endpoint.
    pub const AUTH_URL: &str = "AUTH_URL";
    /// Skip TLS verification for the token endpoint.
    pub const AUTH_DISABLE_SSL: &str = "AUTH_DISABLE_SSL";
    /// Compute resource token file for container auth.
    pub const CR_TOKEN_FILENAME: &str = "CR_TOKEN_FILENAME";
    /// Trusted profile name.
    pub const IAM_PROFILE_NAME: &str = "IAM_PROFILE_NAME";
    /// Trusted profile id.
    pub const IAM_PROFILE_ID: &str = "IAM_PROFILE_ID";
    /// Trusted profile CRN.
    pub const IAM_PROFILE_CRN: &str = "IAM_PROFILE_CRN";
    /// Request body compression.
    pub const ENABLE_GZIP: &str = "ENABLE_GZIP";
    /// Skip TLS verification for service calls.
    pub const DISABLE_SSL: &str = "DISABLE_SSL";
    /// Turn on automatic retries.
    pub const ENABLE_RETRIES: &str = "ENABLE_RETRIES";
    /// Retry bound.
    pub const MAX_RETRIES: &str = "MAX_RETRIES";
    /// Maximum retry interval in seconds.
    pub const RETRY_INTERVAL: &str = "RETRY_INTERVAL";
}

/// Properties for one service, merged from the credentials file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ServiceProperties {
    service_name: String,
    values: HashMap<String, String>,
}

impl ServiceProperties {
    /// Loads properties for `service_name` from the process environment and
    /// the credentials file.
    pub fn load(service_name: &str) -> SccResult<Self> {
        let file = credentials_file_path()?;
        Self::from_sources(service_name, std::env::vars(), file.as_deref())
    }

    /// Builds properties from explicit sources; the environment wins over the file.
    pub fn from_sources<I>(
        service_name: &str,
        env: I,
        credentials_file: Option<&Path>,
    ) -> SccResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let prefix = format!("{}_", env_prefix(service_name));
        let mut values = HashMap::new();

        if let Some(path) = credentials_file {
            let entries = dotenvy::from_path_iter(path).map_err(|e| {
                SccError::configuration(format!(
                    "unable to read credentials file {}: {e}",
                    path.display()
                ))
            })?;
            for entry in entries {
                let (key, value) = entry.map_err(|e| {
                    SccError::configuration(format!(
                        "malformed credentials file {}: {e}",
                        path.display()
                    ))
                })?;
                if let Some(prop) = key.strip_prefix(&prefix) {
                    values.insert(prop.to_string(), value);
                }
            }
        }

        for (key, value) in env {
            if let Some(prop) = key.strip_prefix(&prefix) {
                values.insert(prop.to_string(), value);
            }
        }

        tracing::debug!(
            service = service_name,
            properties = ?values.keys().collect::<Vec<_>>(),
            "Loaded external service properties"
        );

        Ok(Self {
            service_name: service_name.to_string(),
            values,
        })
    }

    /// Creates properties from explicit key/value pairs (suffixes only).
    pub fn from_map(service_name: &str, values: HashMap<String, String>) -> Self {
        Self {
            service_name: service_name.to_string(),
            values,
        }
    }

    /// Returns the service name these properties were loaded for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Returns a non-empty property value.
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.values
            .get(prop)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Parses a boolean property.
    pub fn get_bool(&self, prop: &str) -> SccResult<Option<bool>> {
        self.get(prop).map(|v| parse_bool(prop, v)).transpose()
    }

    /// Parses an unsigned integer property.
    pub fn get_u64(&self, prop: &str) -> SccResult<Option<u64>> {
        self.get(prop)
            .map(|v| {
                v.parse::<u64>().map_err(|_| {
                    SccError::configuration(format!(
                        "{}_{prop} must be a non-negative integer, got '{v}'",
                        env_prefix(&self.service_name)
                    ))
                })
            })
            .transpose()
    }

    /// Returns true if no property was found.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Converts a service name such as `admin-settings` to `ADMIN_SETTINGS`.
pub fn env_prefix(service_name: &str) -> String {
    service_name.to_uppercase().replace('-', "_")
}

fn parse_bool(prop: &str, value: &str) -> SccResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(SccError::configuration(format!(
            "{prop} must be a boolean, got '{value}'"
        ))),
    }
}

/// Locates the credentials file.
///
/// An explicit `IBM_CREDENTIALS_FILE` must exist; the fallback locations are
/// only used when present.
fn credentials_file_path() -> SccResult<Option<PathBuf>> {
    if let Ok(explicit) = std::env::var(CREDENTIALS_FILE_ENV) {
        if !explicit.trim().is_empty() {
            let path = PathBuf::from(explicit);
            if !path.is_file() {
                return Err(SccError::configuration(format!(
                    "{CREDENTIALS_FILE_ENV} points to a missing file: {}",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }
    }

    let candidates = std::env::current_dir()
        .ok()
        .into_iter()
        .chain(std::env::var_os("HOME").map(PathBuf::from))
        .map(|dir| dir.join(DEFAULT_CREDENTIALS_FILE_NAME));

    for candidate in candidates {
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix("admin-settings"), "ADMIN_SETTINGS");
        assert_eq!(env_prefix("config_rules"), "CONFIG_RULES");
    }

    #[test]
    fn test_environment_properties() {
        let properties = ServiceProperties::from_sources(
            "admin",
            env(&[
                ("ADMIN_URL", "https://admin.example.com"),
                ("ADMIN_AUTH_TYPE", "bearerToken"),
                ("OTHER_URL", "https://other.example.com"),
            ]),
            None,
        )
        .unwrap();

        assert_eq!(properties.get(props::URL), Some("https://admin.example.com"));
        assert_eq!(properties.get(props::AUTH_TYPE), Some("bearerToken"));
        assert_eq!(properties.get(props::APIKEY), None);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ADMIN_URL=https://file.example.com").unwrap();
        writeln!(file, "ADMIN_APIKEY=file-key").unwrap();
        writeln!(file, "UNRELATED=1").unwrap();

        let properties = ServiceProperties::from_sources(
            "admin",
            env(&[("ADMIN_URL", "https://env.example.com")]),
            Some(file.path()),
        )
        .unwrap();

        assert_eq!(properties.get(props::URL), Some("https://env.example.com"));
        assert_eq!(properties.get(props::APIKEY), Some("file-key"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = ServiceProperties::from_sources(
            "admin",
            Vec::new(),
            Some(Path::new("/definitely/not/here.env")),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bool_parsing() {
        let properties = ServiceProperties::from_sources(
            "admin",
            env(&[
                ("ADMIN_ENABLE_GZIP", "TRUE"),
                ("ADMIN_DISABLE_SSL", "0"),
                ("ADMIN_ENABLE_RETRIES", "maybe"),
            ]),
            None,
        )
        .unwrap();

        assert_eq!(properties.get_bool(props::ENABLE_GZIP).unwrap(), Some(true));
        assert_eq!(properties.get_bool(props::DISABLE_SSL).unwrap(), Some(false));
        assert!(properties.get_bool(props::ENABLE_RETRIES).is_err());
        assert_eq!(properties.get_bool(props::AUTH_DISABLE_SSL).unwrap(), None);
    }

    #[test]
    fn test_blank_values_ignored() {
        let properties =
            ServiceProperties::from_sources("admin", env(&[("ADMIN_URL", "  ")]), None).unwrap();
        assert_eq!(properties.get(props::URL), None);
    }
}
