//! OIDC session lifecycle around an external provider client.
//!
//! # Design
//! - The provider client is created per `init` through an [`OidcClientFactory`]
//!   and receives a [`ProviderListener`] that persists tokens and forces a
//!   refresh on expiry. The listener holds a weak reference back to the
//!   session so the client and the session do not keep each other alive.
//! - Tokens are persisted under `{app_client_id}-accessToken`,
//!   `{app_client_id}-refreshToken` and `{app_client_id}-idToken`.
//! - Token reads go through a leading-edge [`Throttle`]; the throttle window
//!   must stay below the refresh margin or a token could be handed out after
//!   it expired, so [`RefreshPolicy::new`] rejects such combinations.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use duet_config::{AuthConfig, DelegatedParams, ProviderOverrides};
use duet_store::{Store, StoreResult};
use tracing::{debug, error, info, warn};

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};
use crate::provider::{
    LoginOptions, LogoutOptions, MinValidity, OidcClient, OidcClientFactory,
    ProviderInitOptions, ProviderListener, TokenSet,
};
use crate::throttle::{Throttle, ThrottledRun};

/// Default throttle window for token refreshes.
pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_secs(5);
/// Default minimum remaining validity requested before handing out a token.
pub const DEFAULT_MIN_VALIDITY: Duration = Duration::from_secs(10);

/// Store keys holding the persisted tokens of one application client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenKeys {
    /// Access token key.
    pub access: String,
    /// Refresh token key.
    pub refresh: String,
    /// Id token key.
    pub id: String,
}

impl TokenKeys {
    /// Keys namespaced by `client_id`.
    #[must_use]
    pub fn for_client(client_id: &str) -> Self {
        Self {
            access: format!("{client_id}-accessToken"),
            refresh: format!("{client_id}-refreshToken"),
            id: format!("{client_id}-idToken"),
        }
    }

    async fn load(&self, store: &dyn Store) -> StoreResult<TokenSet> {
        Ok(TokenSet {
            access_token: non_empty(store.get_item(&self.access).await?),
            refresh_token: non_empty(store.get_item(&self.refresh).await?),
            id_token: non_empty(store.get_item(&self.id).await?),
            expires_at: None,
        })
    }

    async fn persist(&self, store: &dyn Store, tokens: &TokenSet) -> StoreResult<()> {
        store
            .set_item(&self.refresh, tokens.refresh_token.as_deref().unwrap_or_default())
            .await?;
        store
            .set_item(&self.access, tokens.access_token.as_deref().unwrap_or_default())
            .await?;
        store
            .set_item(&self.id, tokens.id_token.as_deref().unwrap_or_default())
            .await
    }

    async fn purge(&self, store: &dyn Store) -> StoreResult<()> {
        store.remove_item(&self.refresh).await?;
        store.remove_item(&self.access).await?;
        store.remove_item(&self.id).await
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

/// Throttle window and refresh margin used by [`DelegatedSession::token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    window: Duration,
    min_validity: Duration,
}

impl RefreshPolicy {
    /// Combine a throttle window with a refresh margin; `None` unless the
    /// window is strictly shorter than the margin.
    #[must_use]
    pub fn new(window: Duration, min_validity: Duration) -> Option<Self> {
        (window < min_validity).then_some(Self {
            window,
            min_validity,
        })
    }

    /// Throttle window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Minimum remaining validity requested on refresh.
    #[must_use]
    pub const fn min_validity(&self) -> Duration {
        self.min_validity
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_REFRESH_WINDOW,
            min_validity: DEFAULT_MIN_VALIDITY,
        }
    }
}

struct ActiveSession {
    client: Arc<dyn OidcClient>,
    params: DelegatedParams,
    keys: TokenKeys,
    overrides: ProviderOverrides,
}

struct SessionShared {
    store: Arc<dyn Store>,
    active: RwLock<Option<Arc<ActiveSession>>>,
    throttle: Throttle,
    policy: RefreshPolicy,
}

impl SessionShared {
    fn active(&self) -> Option<Arc<ActiveSession>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, session: Option<Arc<ActiveSession>>) -> Option<Arc<ActiveSession>> {
        std::mem::replace(
            &mut *self.active.write().unwrap_or_else(PoisonError::into_inner),
            session,
        )
    }

    async fn refresh(&self, min_validity: MinValidity) {
        let Some(session) = self.active() else {
            return;
        };
        match session.client.update_token(min_validity).await {
            Ok(true) => debug!("token refreshed"),
            Ok(false) => {}
            Err(err) => error!(error = %err, "token refresh failed"),
        }
    }

    fn refresh_throttled(self: &Arc<Self>) -> ThrottledRun {
        let session = Arc::downgrade(self);
        let min_validity = MinValidity::Within(self.policy.min_validity);
        self.throttle.run(move || async move {
            if let Some(shared) = session.upgrade() {
                shared.refresh(min_validity).await;
            }
        })
    }
}

/// Provider callbacks registered with the client at construction time.
struct SessionListener {
    store: Arc<dyn Store>,
    keys: TokenKeys,
    session: Weak<SessionShared>,
}

impl SessionListener {
    async fn persist(&self, tokens: &TokenSet) {
        if let Err(err) = self.keys.persist(self.store.as_ref(), tokens).await {
            warn!(error = %err, key = %self.keys.access, "failed to persist tokens");
        }
    }
}

#[async_trait]
impl ProviderListener for SessionListener {
    async fn on_auth_success(&self, tokens: &TokenSet) {
        self.persist(tokens).await;
    }

    async fn on_auth_refresh_success(&self, tokens: &TokenSet) {
        self.persist(tokens).await;
    }

    async fn on_token_expired(&self) {
        if let Some(shared) = self.session.upgrade() {
            shared.refresh(MinValidity::Expired).await;
        }
    }
}

/// Owns the OIDC provider session and its persisted tokens.
pub struct DelegatedSession {
    factory: Arc<dyn OidcClientFactory>,
    shared: Arc<SessionShared>,
}

impl DelegatedSession {
    /// Construct an uninitialised manager with the default refresh policy.
    #[must_use]
    pub fn new(context: &AuthContext, factory: Arc<dyn OidcClientFactory>) -> Self {
        Self::with_refresh_policy(context, factory, RefreshPolicy::default())
    }

    /// Construct an uninitialised manager with a custom refresh policy.
    #[must_use]
    pub fn with_refresh_policy(
        context: &AuthContext,
        factory: Arc<dyn OidcClientFactory>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            factory,
            shared: Arc::new(SessionShared {
                store: Arc::clone(context.store()),
                active: RwLock::new(None),
                throttle: Throttle::new(policy.window()),
                policy,
            }),
        }
    }

    /// Create the provider client and run its silent init, seeded with the
    /// persisted tokens.
    ///
    /// Missing provider URL, realm or client id is an inactive mode and yields
    /// `false`. Any failure afterwards purges the persisted tokens, drops the
    /// client and also yields `false`.
    pub async fn init(&self, config: &AuthConfig) -> bool {
        let Some(params) = config.delegated() else {
            debug!("delegated mode inactive: provider url, realm or client id missing");
            return false;
        };

        let keys = TokenKeys::for_client(&params.app_client_id);
        match self.start(params, keys.clone(), &config.provider).await {
            Ok(authenticated) => authenticated,
            Err(err) => {
                error!(error = %err, operation = err.operation(), "auth init failed");
                let _ = self.shared.replace(None);
                if let Err(purge) = keys.purge(self.shared.store.as_ref()).await {
                    warn!(error = %purge, "failed to purge persisted tokens");
                }
                false
            }
        }
    }

    async fn start(
        &self,
        params: DelegatedParams,
        keys: TokenKeys,
        overrides: &ProviderOverrides,
    ) -> AuthResult<bool> {
        let listener = Arc::new(SessionListener {
            store: Arc::clone(&self.shared.store),
            keys: keys.clone(),
            session: Arc::downgrade(&self.shared),
        });
        let client = self
            .factory
            .create(&params, listener)
            .map_err(|source| AuthError::Provider {
                operation: "delegated.init",
                source,
            })?;

        let session = Arc::new(ActiveSession {
            client,
            params,
            keys,
            overrides: overrides.clone(),
        });
        let _ = self.shared.replace(Some(Arc::clone(&session)));
        self.silent_init(&session).await
    }

    async fn silent_init(&self, session: &ActiveSession) -> AuthResult<bool> {
        let persisted = session
            .keys
            .load(self.shared.store.as_ref())
            .await
            .map_err(|source| AuthError::Store {
                operation: "delegated.init",
                source,
            })?;
        let options = ProviderInitOptions::from_overrides(&session.overrides, persisted);
        let authenticated =
            session
                .client
                .init(options)
                .await
                .map_err(|source| AuthError::Provider {
                    operation: "delegated.init",
                    source,
                })?;
        if authenticated {
            info!(client_id = %session.params.app_client_id, "delegated session authenticated");
        }
        Ok(authenticated)
    }

    /// Re-run the provider's silent init against the existing client.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] when no client exists, or the
    /// provider/store failure from the init.
    pub async fn reinitialize(&self) -> AuthResult<bool> {
        let session = self.require("delegated.update")?;
        self.silent_init(&session).await
    }

    /// Whether a provider client exists.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.shared.active().is_some()
    }

    /// Whether the provider reports an authenticated session.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.shared
            .active()
            .is_some_and(|session| session.client.authenticated())
    }

    /// Resource-role check against the override, the API client or the
    /// application client, in that order.
    #[must_use]
    pub fn has_role(&self, role: &str, resource_override: Option<&str>) -> bool {
        self.shared.active().is_some_and(|session| {
            let resource = session.params.role_resource(resource_override);
            session.client.has_resource_role(role, resource)
        })
    }

    /// Tokens currently held by the provider client.
    #[must_use]
    pub fn tokens(&self) -> Option<TokenSet> {
        self.shared.active().map(|session| session.client.tokens())
    }

    /// Refresh through the throttle, then return the current access token.
    /// Empty when no client or no refresh token is on hand.
    pub async fn token(&self) -> String {
        let Some(session) = self.shared.active() else {
            return String::new();
        };
        if !session.client.tokens().has_refresh_token() {
            return String::new();
        }

        self.shared.refresh_throttled().await;
        session.client.tokens().access_token.unwrap_or_default()
    }

    /// Ask the provider to renew the token when it expires within `min_validity`.
    /// Failures are logged and never returned.
    pub async fn refresh(&self, min_validity: MinValidity) {
        self.shared.refresh(min_validity).await;
    }

    /// Navigate to the provider's login page.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] without a client, or the provider failure.
    pub async fn login(&self, redirect_uri: String, idp_hint: Option<String>) -> AuthResult<()> {
        info!(redirect_uri = %redirect_uri, "login navigating to identity provider");
        let session = self.require("delegated.login")?;
        session
            .client
            .login(LoginOptions {
                redirect_uri,
                idp_hint,
            })
            .await
            .map_err(|source| AuthError::Provider {
                operation: "delegated.login",
                source,
            })
    }

    /// Build the provider's login URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] without a client, or the provider failure.
    pub fn create_login_url(
        &self,
        redirect_uri: String,
        idp_hint: Option<String>,
    ) -> AuthResult<String> {
        debug!(redirect_uri = %redirect_uri, "create login url");
        let session = self.require("delegated.create_login_url")?;
        session
            .client
            .create_login_url(&LoginOptions {
                redirect_uri,
                idp_hint,
            })
            .map_err(|source| AuthError::Provider {
                operation: "delegated.create_login_url",
                source,
            })
    }

    /// Build the provider's logout URL.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] without a client, or the provider failure.
    pub fn create_logout_url(&self, redirect_uri: String) -> AuthResult<String> {
        debug!(redirect_uri = %redirect_uri, "create logout url");
        let session = self.require("delegated.create_logout_url")?;
        session
            .client
            .create_logout_url(&LogoutOptions { redirect_uri })
            .map_err(|source| AuthError::Provider {
                operation: "delegated.create_logout_url",
                source,
            })
    }

    /// Purge the persisted tokens, drop the client and navigate to the
    /// provider's logout endpoint. Without a client there is nothing to end.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the tokens cannot be purged, or the
    /// provider failure from the logout navigation.
    pub async fn logout(&self, redirect_uri: String) -> AuthResult<()> {
        info!(redirect_uri = %redirect_uri, "logout navigating to identity provider");
        let Some(session) = self.teardown("delegated.logout").await? else {
            debug!("logout without a provider session");
            return Ok(());
        };
        session
            .client
            .logout(LogoutOptions { redirect_uri })
            .await
            .map_err(|source| AuthError::Provider {
                operation: "delegated.logout",
                source,
            })
    }

    /// Drop the provider session locally: purge tokens and the client without
    /// contacting the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the tokens cannot be purged.
    pub async fn discard(&self) -> AuthResult<()> {
        let _ = self.teardown("delegated.discard").await?;
        Ok(())
    }

    async fn teardown(&self, operation: &'static str) -> AuthResult<Option<Arc<ActiveSession>>> {
        let Some(session) = self.shared.replace(None) else {
            return Ok(None);
        };
        self.shared.throttle.reset();
        session
            .keys
            .purge(self.shared.store.as_ref())
            .await
            .map_err(|source| AuthError::Store { operation, source })?;
        Ok(Some(session))
    }

    fn require(&self, operation: &'static str) -> AuthResult<Arc<ActiveSession>> {
        self.shared
            .active()
            .ok_or(AuthError::NotInitialized { operation })
    }
}

impl fmt::Debug for DelegatedSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DelegatedSession")
            .field("active", &self.is_active())
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_store::MemoryStore;

    struct NoClient;

    impl OidcClientFactory for NoClient {
        fn create(
            &self,
            _params: &DelegatedParams,
            _listener: Arc<dyn ProviderListener>,
        ) -> Result<Arc<dyn OidcClient>, crate::error::ProviderError> {
            Err(crate::error::ProviderError::Network {
                detail: "unreachable".into(),
            })
        }
    }

    fn complete_config() -> AuthConfig {
        AuthConfig {
            auth_url: Some("https://id.example.com".into()),
            realm: Some("main".into()),
            app_client_id: Some("app1".into()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn token_keys_are_namespaced_by_client() {
        let keys = TokenKeys::for_client("app1");
        assert_eq!(keys.access, "app1-accessToken");
        assert_eq!(keys.refresh, "app1-refreshToken");
        assert_eq!(keys.id, "app1-idToken");
    }

    #[test]
    fn refresh_policy_requires_window_below_margin() {
        assert!(RefreshPolicy::new(Duration::from_secs(5), Duration::from_secs(5)).is_none());
        let policy = RefreshPolicy::new(Duration::from_secs(1), Duration::from_secs(3)).unwrap();
        assert_eq!(policy.window(), Duration::from_secs(1));
        assert_eq!(RefreshPolicy::default().min_validity(), DEFAULT_MIN_VALIDITY);
    }

    #[tokio::test]
    async fn incomplete_config_is_inactive_without_touching_the_store() {
        let store = MemoryStore::with_entries([("app1-accessToken", "a")]);
        let context = AuthContext::builder().store(Arc::new(store.clone())).build();
        let session = DelegatedSession::new(&context, Arc::new(NoClient));

        let mut config = complete_config();
        config.realm = None;
        assert!(!session.init(&config).await);
        assert!(store.contains_key("app1-accessToken"));
        assert!(!session.is_active());
    }

    #[tokio::test]
    async fn failed_client_construction_purges_tokens() {
        let store = MemoryStore::with_entries([
            ("app1-accessToken", "a"),
            ("app1-refreshToken", "r"),
            ("app1-idToken", "i"),
            ("other-accessToken", "x"),
        ]);
        let context = AuthContext::builder().store(Arc::new(store.clone())).build();
        let session = DelegatedSession::new(&context, Arc::new(NoClient));

        assert!(!session.init(&complete_config()).await);
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("other-accessToken"));
        assert!(!session.authenticated());
        assert_eq!(session.token().await, "");
    }

    #[tokio::test]
    async fn calls_without_client_are_usage_faults() {
        let session = DelegatedSession::new(&AuthContext::default(), Arc::new(NoClient));
        assert!(
            session
                .login("https://app.example.com".into(), None)
                .await
                .unwrap_err()
                .is_usage_fault()
        );
        assert!(
            session
                .create_login_url("https://app.example.com".into(), None)
                .unwrap_err()
                .is_usage_fault()
        );
        assert!(
            session
                .create_logout_url("https://app.example.com".into())
                .unwrap_err()
                .is_usage_fault()
        );
        assert!(session.reinitialize().await.unwrap_err().is_usage_fault());
        session.logout("https://app.example.com".into()).await.unwrap();
    }
}
