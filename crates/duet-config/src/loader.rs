//! Loading configuration from JSON documents and environment variables.

use std::path::Path;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AuthConfig;
use crate::validate::validate;

/// Prefix for environment overrides (`DUET_AUTH_URL`, `DUET_REALM`, ...).
pub const ENV_PREFIX: &str = "DUET_";

impl AuthConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::InvalidField`] for values that fail validation.
    pub fn from_json_str(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        validate(&config)?;
        Ok(config)
    }

    /// Read, parse and validate the JSON document at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise the
    /// errors of [`AuthConfig::from_json_str`].
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded auth configuration");
        Self::from_json_str(&document)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when an override produces an
    /// invalid document.
    pub fn with_process_env(self) -> ConfigResult<Self> {
        self.with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides resolved through `lookup`, which receives the full
    /// variable name (e.g. `DUET_REALM`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when an override produces an
    /// invalid document.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));

        override_field(&mut self.auth_url, read("AUTH_URL"));
        override_field(&mut self.realm, read("REALM"));
        override_field(&mut self.app_client_id, read("APP_CLIENT_ID"));
        override_field(&mut self.api_client_id, read("API_CLIENT_ID"));
        override_field(&mut self.guest_client_id, read("GUEST_CLIENT_ID"));

        if let Some(raw) = read("GUEST_ROLES") {
            let roles: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|role| !role.is_empty())
                .map(str::to_string)
                .collect();
            self.guest_roles = Some(roles);
        }

        validate(&self)?;
        Ok(self)
    }
}

fn override_field(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        *target = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn from_json_str_reads_nested_provider_overrides() {
        let config = AuthConfig::from_json_str(
            r#"{
                "auth_url": "https://id.example.com",
                "realm": "main",
                "app_client_id": "app1",
                "provider": { "flow": "implicit", "time_skew_secs": 5 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.provider.flow, Some(crate::AuthFlow::Implicit));
        assert_eq!(config.provider.time_skew_secs, Some(5));
        assert!(config.delegated().is_some());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = AuthConfig::from_json_str("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_replace_document_values() {
        let base = AuthConfig {
            realm: Some("staging".into()),
            ..AuthConfig::default()
        };
        let config = base
            .with_env_overrides(lookup_from(&[
                ("DUET_REALM", "prod"),
                ("DUET_GUEST_CLIENT_ID", "kiosk"),
                ("DUET_GUEST_ROLES", "editor, viewer,,"),
            ]))
            .unwrap();

        assert_eq!(config.realm.as_deref(), Some("prod"));
        assert_eq!(config.guest_client_id(), Some("kiosk"));
        assert_eq!(config.guest_roles(), vec!["editor", "viewer"]);
    }

    #[test]
    fn env_override_with_bad_url_fails_validation() {
        let err = AuthConfig::default()
            .with_env_overrides(lookup_from(&[("DUET_AUTH_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }
}
