//! Seam between the delegated session manager and an external OIDC client.
//!
//! The provider client owns the protocol (redirect handshake, token issuance,
//! renewal); this crate only drives it. Provider callbacks are modelled as a
//! [`ProviderListener`] handed to the factory when the client is constructed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duet_config::{AuthFlow, DelegatedParams, ProviderOverrides};

use crate::error::ProviderError;

/// Tokens currently held by the provider client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer access token.
    pub access_token: Option<String>,
    /// Refresh token used to renew the access token.
    pub refresh_token: Option<String>,
    /// OIDC id token.
    pub id_token: Option<String>,
    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Whether a non-empty refresh token is available.
    #[must_use]
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token
            .as_deref()
            .is_some_and(|token| !token.is_empty())
    }
}

/// Remaining-lifetime threshold passed to [`OidcClient::update_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinValidity {
    /// Treat the token as already expired and renew unconditionally.
    Expired,
    /// Renew when the token expires within the given margin.
    Within(Duration),
}

impl MinValidity {
    /// Seconds form used by OIDC client libraries, `-1` for [`MinValidity::Expired`].
    #[must_use]
    pub fn as_secs(self) -> i64 {
        match self {
            Self::Expired => -1,
            Self::Within(margin) => i64::try_from(margin.as_secs()).unwrap_or(i64::MAX),
        }
    }
}

/// Options for the provider's silent init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitOptions {
    /// OIDC flow.
    pub flow: AuthFlow,
    /// Clock skew between client and provider, in seconds.
    pub time_skew_secs: i64,
    /// Whether the provider client logs on its own.
    pub enable_logging: bool,
    /// PKCE method.
    pub pkce_method: Option<String>,
    /// Redirect target used for silent SSO checks.
    pub silent_check_sso_redirect_uri: Option<String>,
    /// Previously persisted access token.
    pub token: Option<String>,
    /// Previously persisted refresh token.
    pub refresh_token: Option<String>,
    /// Previously persisted id token.
    pub id_token: Option<String>,
}

impl ProviderInitOptions {
    /// Defaults (standard flow, no skew, provider logging off) with `overrides`
    /// applied field by field, seeded with `persisted` tokens.
    #[must_use]
    pub fn from_overrides(overrides: &ProviderOverrides, persisted: TokenSet) -> Self {
        Self {
            flow: overrides.flow.unwrap_or_default(),
            time_skew_secs: overrides.time_skew_secs.unwrap_or(0),
            enable_logging: overrides.enable_logging.unwrap_or(false),
            pkce_method: overrides.pkce_method.clone(),
            silent_check_sso_redirect_uri: overrides.silent_check_sso_redirect_uri.clone(),
            token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            id_token: persisted.id_token,
        }
    }
}

/// Options for an interactive login redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    /// Where the provider sends the browser back to.
    pub redirect_uri: String,
    /// Identity provider hint (brokered login).
    pub idp_hint: Option<String>,
}

/// Options for a logout redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoutOptions {
    /// Where the provider sends the browser back to.
    pub redirect_uri: String,
}

/// Session handle of an external OIDC client.
#[async_trait]
pub trait OidcClient: Send + Sync {
    /// Silent init; resolves to whether a session is established.
    async fn init(&self, options: ProviderInitOptions) -> Result<bool, ProviderError>;

    /// Renew the access token when it expires within `min_validity`;
    /// resolves to whether a renewal happened.
    async fn update_token(&self, min_validity: MinValidity) -> Result<bool, ProviderError>;

    /// Current tokens.
    fn tokens(&self) -> TokenSet;

    /// Whether the provider considers the session authenticated.
    fn authenticated(&self) -> bool;

    /// Whether the session carries `role` on client `resource`.
    fn has_resource_role(&self, role: &str, resource: &str) -> bool;

    /// Navigate to the provider's login page.
    async fn login(&self, options: LoginOptions) -> Result<(), ProviderError>;

    /// Build the provider's login URL without navigating.
    fn create_login_url(&self, options: &LoginOptions) -> Result<String, ProviderError>;

    /// Build the provider's logout URL without navigating.
    fn create_logout_url(&self, options: &LogoutOptions) -> Result<String, ProviderError>;

    /// Navigate to the provider's logout endpoint.
    async fn logout(&self, options: LogoutOptions) -> Result<(), ProviderError>;
}

/// Constructs provider clients and registers the lifecycle listener.
pub trait OidcClientFactory: Send + Sync {
    /// Build a client for `params` that reports lifecycle events to `listener`.
    fn create(
        &self,
        params: &DelegatedParams,
        listener: Arc<dyn ProviderListener>,
    ) -> Result<Arc<dyn OidcClient>, ProviderError>;
}

/// Provider lifecycle callbacks.
#[async_trait]
pub trait ProviderListener: Send + Sync {
    /// A login or silent init produced tokens.
    async fn on_auth_success(&self, tokens: &TokenSet);

    /// A token renewal produced tokens.
    async fn on_auth_refresh_success(&self, tokens: &TokenSet);

    /// The access token expired.
    async fn on_token_expired(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_validity_seconds() {
        assert_eq!(MinValidity::Expired.as_secs(), -1);
        assert_eq!(MinValidity::Within(Duration::from_secs(10)).as_secs(), 10);
    }

    #[test]
    fn init_options_apply_overrides_over_defaults() {
        let persisted = TokenSet {
            access_token: Some("a".into()),
            refresh_token: Some("r".into()),
            ..TokenSet::default()
        };
        let defaults = ProviderInitOptions::from_overrides(&ProviderOverrides::default(), persisted);
        assert_eq!(defaults.flow, AuthFlow::Standard);
        assert_eq!(defaults.time_skew_secs, 0);
        assert!(!defaults.enable_logging);
        assert_eq!(defaults.token.as_deref(), Some("a"));
        assert_eq!(defaults.refresh_token.as_deref(), Some("r"));
        assert!(defaults.id_token.is_none());

        let overrides = ProviderOverrides {
            flow: Some(AuthFlow::Hybrid),
            time_skew_secs: Some(3),
            pkce_method: Some("S256".into()),
            ..ProviderOverrides::default()
        };
        let custom = ProviderInitOptions::from_overrides(&overrides, TokenSet::default());
        assert_eq!(custom.flow, AuthFlow::Hybrid);
        assert_eq!(custom.time_skew_secs, 3);
        assert_eq!(custom.pkce_method.as_deref(), Some("S256"));
    }

    #[test]
    fn refresh_token_presence_ignores_empty_values() {
        let mut tokens = TokenSet::default();
        assert!(!tokens.has_refresh_token());
        tokens.refresh_token = Some(String::new());
        assert!(!tokens.has_refresh_token());
        tokens.refresh_token = Some("r".into());
        assert!(tokens.has_refresh_token());
    }
}
