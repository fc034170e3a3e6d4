//! Validation helpers for configuration documents.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::AuthConfig;

pub(crate) fn validate(config: &AuthConfig) -> ConfigResult<()> {
    if let Some(raw) = config.auth_url.as_deref().filter(|raw| !raw.trim().is_empty()) {
        parse_auth_url(raw)?;
    }

    if let Some(roles) = &config.guest_roles {
        if let Some(blank) = roles.iter().find(|role| role.trim().is_empty()) {
            return Err(ConfigError::InvalidField {
                field: "guest_roles",
                value: Some(blank.clone()),
                reason: "role names must not be blank",
            });
        }
    }

    Ok(())
}

impl AuthConfig {
    /// Reject malformed values. Missing delegated fields are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        validate(self)
    }
}

fn parse_auth_url(raw: &str) -> ConfigResult<Url> {
    let invalid = || ConfigError::InvalidField {
        field: "auth_url",
        value: Some(raw.to_string()),
        reason: "must be an absolute http(s) URL",
    };

    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_config_is_valid() {
        assert!(AuthConfig::default().validate().is_ok());
    }

    #[test]
    fn relative_auth_url_is_rejected() {
        let config = AuthConfig {
            auth_url: Some("/auth".into()),
            ..AuthConfig::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "auth_url",
                ..
            }
        ));
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let config = AuthConfig {
            auth_url: Some("ftp://id.example.com".into()),
            ..AuthConfig::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn blank_guest_role_is_rejected() {
        let config = AuthConfig {
            guest_roles: Some(vec!["editor".into(), " ".into()]),
            ..AuthConfig::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "guest_roles",
                ..
            }
        ));
    }
}
