//! Configuration document types.

use serde::{Deserialize, Serialize};

/// Role granted to guests when no role list is configured.
pub const DEFAULT_GUEST_ROLE: &str = "User";

/// Authentication configuration supplied once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity provider base URL.
    pub auth_url: Option<String>,
    /// Realm (tenant) on the identity provider.
    pub realm: Option<String>,
    /// Client identifier of this application.
    pub app_client_id: Option<String>,
    /// Client identifier of the API whose roles are checked.
    pub api_client_id: Option<String>,
    /// Guest-mode namespace; guest mode is disabled when absent.
    pub guest_client_id: Option<String>,
    /// Roles granted to guests.
    pub guest_roles: Option<Vec<String>>,
    /// Provider-specific init overrides.
    pub provider: ProviderOverrides,
}

/// Identity-provider connection parameters, present only when complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegatedParams {
    /// Identity provider base URL.
    pub auth_url: String,
    /// Realm (tenant) on the identity provider.
    pub realm: String,
    /// Client identifier of this application.
    pub app_client_id: String,
    /// Client identifier of the API whose roles are checked.
    pub api_client_id: Option<String>,
}

impl DelegatedParams {
    /// Resource whose roles are checked: the override, then the API client,
    /// then the application client.
    #[must_use]
    pub fn role_resource<'a>(&'a self, resource_override: Option<&'a str>) -> &'a str {
        resource_override
            .filter(|value| !value.is_empty())
            .or(self.api_client_id.as_deref())
            .unwrap_or(self.app_client_id.as_str())
    }
}

/// OIDC flow requested from the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthFlow {
    /// Authorization code flow.
    #[default]
    Standard,
    /// Implicit flow.
    Implicit,
    /// Hybrid flow.
    Hybrid,
}

impl AuthFlow {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Implicit => "implicit",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Overrides applied on top of the default provider init options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverrides {
    /// Flow override.
    pub flow: Option<AuthFlow>,
    /// Clock skew between client and provider, in seconds.
    pub time_skew_secs: Option<i64>,
    /// Whether the provider client logs on its own.
    pub enable_logging: Option<bool>,
    /// PKCE method (e.g. `S256`).
    pub pkce_method: Option<String>,
    /// Redirect target used for silent SSO checks.
    pub silent_check_sso_redirect_uri: Option<String>,
}

fn present(value: Option<&String>) -> Option<&str> {
    value.map(|text| text.trim()).filter(|text| !text.is_empty())
}

impl AuthConfig {
    /// Delegated-mode parameters, `None` when any required field is missing.
    #[must_use]
    pub fn delegated(&self) -> Option<DelegatedParams> {
        let auth_url = present(self.auth_url.as_ref())?;
        let realm = present(self.realm.as_ref())?;
        let app_client_id = present(self.app_client_id.as_ref())?;
        Some(DelegatedParams {
            auth_url: auth_url.to_string(),
            realm: realm.to_string(),
            app_client_id: app_client_id.to_string(),
            api_client_id: present(self.api_client_id.as_ref()).map(str::to_string),
        })
    }

    /// Guest namespace, `None` when guest mode is disabled.
    #[must_use]
    pub fn guest_client_id(&self) -> Option<&str> {
        present(self.guest_client_id.as_ref())
    }

    /// Roles granted to guests: the configured list, which may be empty, or
    /// the default role when none is configured.
    #[must_use]
    pub fn guest_roles(&self) -> Vec<String> {
        self.guest_roles
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_GUEST_ROLE.to_string()])
    }
}
