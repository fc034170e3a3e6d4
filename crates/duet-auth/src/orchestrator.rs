//! Single credential surface over the guest and delegated session managers.
//!
//! # Design
//! - `init_once` records the configuration and resolves the active mode exactly
//!   once; concurrent callers share the in-flight run.
//! - Guest mode is resolved first and, once it wins, stays active for the life
//!   of the orchestrator. The delegated manager is not consulted at all in that
//!   case.
//! - Every mutating call made before a configuration is recorded is a usage
//!   fault ([`AuthError::NotInitialized`]).

use std::fmt;
use std::sync::{Arc, OnceLock};

use duet_config::AuthConfig;
use duet_events::AuthEvent;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::AuthContext;
use crate::delegated::{DelegatedSession, RefreshPolicy};
use crate::error::{AuthError, AuthResult};
use crate::guest::GuestSession;
use crate::init_gate::InitGate;
use crate::provider::OidcClientFactory;

/// Mode resolved by [`AuthOrchestrator::init_once`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitOutcome {
    /// A persisted guest identity was found.
    Guest,
    /// The identity provider reported an already-valid session.
    Delegated,
    /// Neither mode produced a session.
    Unauthenticated,
}

struct Inner {
    context: AuthContext,
    config: OnceLock<AuthConfig>,
    guest: GuestSession,
    delegated: DelegatedSession,
    gate: InitGate<InitOutcome>,
}

impl Inner {
    async fn initialize(&self, config: AuthConfig) -> InitOutcome {
        let config = self.config.get_or_init(|| config);

        match self.guest.init(config).await {
            Ok(true) => {
                let _ = self.context.events().publish(AuthEvent::GuestAuthenticated);
                return InitOutcome::Guest;
            }
            Ok(false) => {}
            Err(err) => warn!(error = %err, "guest init failed"),
        }

        if self.delegated.init(config).await {
            let _ = self
                .context
                .events()
                .publish(AuthEvent::AlreadyAuthenticated);
            InitOutcome::Delegated
        } else {
            InitOutcome::Unauthenticated
        }
    }

    fn config(&self, operation: &'static str) -> AuthResult<&AuthConfig> {
        self.config
            .get()
            .ok_or(AuthError::NotInitialized { operation })
    }

    fn require_init(&self, operation: &'static str) -> AuthResult<()> {
        self.config(operation).map(|_| ())
    }

    fn redirect_target(&self, redirect_override: Option<&str>) -> String {
        redirect_override
            .filter(|target| !target.is_empty())
            .map_or_else(|| self.context.navigator().current_location(), str::to_string)
    }
}

/// Entry point the application talks to for credentials, roles and login state.
#[derive(Clone)]
pub struct AuthOrchestrator {
    inner: Arc<Inner>,
}

impl AuthOrchestrator {
    /// Construct an orchestrator whose delegated mode uses clients from `factory`.
    #[must_use]
    pub fn new(context: AuthContext, factory: Arc<dyn OidcClientFactory>) -> Self {
        Self::with_refresh_policy(context, factory, RefreshPolicy::default())
    }

    /// Construct an orchestrator with a custom refresh throttle policy.
    #[must_use]
    pub fn with_refresh_policy(
        context: AuthContext,
        factory: Arc<dyn OidcClientFactory>,
        policy: RefreshPolicy,
    ) -> Self {
        let delegated = DelegatedSession::with_refresh_policy(&context, factory, policy);
        Self {
            inner: Arc::new(Inner {
                guest: GuestSession::new(context.clone()),
                delegated,
                context,
                config: OnceLock::new(),
                gate: InitGate::new(),
            }),
        }
    }

    /// Resolve the active mode once; later and concurrent calls return the
    /// first outcome and ignore their `config`. Never fails: every init
    /// failure degrades to [`InitOutcome::Unauthenticated`].
    pub async fn init_once(&self, config: AuthConfig) -> InitOutcome {
        let inner = Arc::clone(&self.inner);
        self.inner
            .gate
            .run(move || async move { inner.initialize(config).await })
            .await
    }

    /// Outcome of the first `init_once`, `None` until it finished.
    #[must_use]
    pub fn init_outcome(&self) -> Option<InitOutcome> {
        self.inner.gate.outcome()
    }

    /// Shared collaborators.
    #[must_use]
    pub fn context(&self) -> &AuthContext {
        &self.inner.context
    }

    /// Whether either mode holds a session.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.inner.guest.authenticated() || self.inner.delegated.authenticated()
    }

    /// Whether guest mode is active.
    #[must_use]
    pub fn is_guest(&self) -> bool {
        self.inner.guest.authenticated()
    }

    /// Current credential: the guest identifier in guest mode, otherwise the
    /// (throttled-refresh) access token. Empty when unauthenticated.
    pub async fn token(&self) -> String {
        if self.inner.guest.authenticated() {
            return self.inner.guest.guest_id();
        }
        self.inner.delegated.token().await
    }

    /// Role check; an absent or empty role is no restriction.
    #[must_use]
    pub fn has_role(&self, role: Option<&str>, resource_override: Option<&str>) -> bool {
        let Some(role) = role.filter(|role| !role.is_empty()) else {
            return true;
        };
        self.inner.guest.has_role(role)
            || self.inner.delegated.has_role(role, resource_override)
    }

    /// Create a guest identity. An authenticated delegated session is dropped
    /// locally first so the two modes never overlap.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once` or without guest
    /// mode configured, or the store failure.
    pub async fn login_guest(&self) -> AuthResult<()> {
        let config = self.inner.config("auth.login_guest")?;
        if !self.inner.guest.is_configured() {
            return Err(AuthError::NotInitialized {
                operation: "auth.login_guest",
            });
        }
        if self.inner.delegated.authenticated() {
            info!("guest login replaces the delegated session");
            self.inner.delegated.discard().await?;
        }
        self.inner.guest.login(config).await
    }

    /// Navigate to the identity provider, returning to the current location.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once` or without a
    /// provider session, or the provider failure.
    pub async fn login(&self, idp_hint: Option<&str>) -> AuthResult<()> {
        self.inner.require_init("auth.login")?;
        let redirect_uri = self.inner.context.navigator().current_location();
        self.inner
            .delegated
            .login(redirect_uri, idp_hint.map(str::to_string))
            .await
    }

    /// Login URL returning to `redirect_override` or the current location.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once` or without a
    /// provider session, or the provider failure.
    pub fn create_login_url(
        &self,
        idp_hint: Option<&str>,
        redirect_override: Option<&str>,
    ) -> AuthResult<String> {
        self.inner.require_init("auth.create_login_url")?;
        self.inner.delegated.create_login_url(
            self.inner.redirect_target(redirect_override),
            idp_hint.map(str::to_string),
        )
    }

    /// Logout URL returning to `redirect_override` or the current location.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once` or without a
    /// provider session, or the provider failure.
    pub fn create_logout_url(&self, redirect_override: Option<&str>) -> AuthResult<String> {
        self.inner.require_init("auth.create_logout_url")?;
        self.inner
            .delegated
            .create_logout_url(self.inner.redirect_target(redirect_override))
    }

    /// Re-run the provider's silent init; publishes
    /// [`AuthEvent::AlreadyAuthenticated`] when it yields a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once` or without a
    /// provider session, or the provider/store failure.
    pub async fn update(&self) -> AuthResult<bool> {
        self.inner.require_init("auth.update")?;
        let authenticated = self.inner.delegated.reinitialize().await?;
        if authenticated {
            let _ = self
                .inner
                .context
                .events()
                .publish(AuthEvent::AlreadyAuthenticated);
        }
        Ok(authenticated)
    }

    /// End the active session. Guest logout asks the navigator to reload;
    /// delegated logout navigates to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] before `init_once`, or the
    /// store/provider failure of the active manager.
    pub async fn logout(&self, redirect_uri: Option<&str>) -> AuthResult<()> {
        self.inner.require_init("auth.logout")?;
        if self.inner.guest.authenticated() {
            return self.inner.guest.logout().await;
        }
        let target = self.inner.redirect_target(redirect_uri);
        debug!(redirect_uri = %target, "routing logout to the delegated session");
        self.inner.delegated.logout(target).await
    }
}

impl fmt::Debug for AuthOrchestrator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthOrchestrator")
            .field("outcome", &self.init_outcome())
            .field("guest", &self.inner.guest)
            .field("delegated", &self.inner.delegated)
            .finish_non_exhaustive()
    }
}
