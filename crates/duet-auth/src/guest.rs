//! Anonymous guest identity lifecycle.
//!
//! A guest identity is a random UUID persisted under `{guest_client_id}-guestId`.
//! Nothing is generated until an explicit login; a persisted identifier found
//! at init authenticates the guest with the configured role set.

use std::sync::{PoisonError, RwLock};

use duet_config::AuthConfig;
use duet_events::AuthEvent;
use tracing::{debug, info};
use uuid::Uuid;

use crate::context::AuthContext;
use crate::error::{AuthError, AuthResult};

const GUEST_KEY_SUFFIX: &str = "guestId";

#[derive(Debug, Clone, Default)]
struct GuestState {
    key: String,
    guest_id: String,
    roles: Vec<String>,
}

/// Owns the guest identifier and its role set.
#[derive(Debug)]
pub struct GuestSession {
    context: AuthContext,
    state: RwLock<Option<GuestState>>,
}

impl GuestSession {
    /// Construct an uninitialised guest manager.
    #[must_use]
    pub const fn new(context: AuthContext) -> Self {
        Self {
            context,
            state: RwLock::new(None),
        }
    }

    /// Store key for the guest identifier of `guest_client_id`.
    #[must_use]
    pub fn storage_key(guest_client_id: &str) -> String {
        format!("{guest_client_id}-{GUEST_KEY_SUFFIX}")
    }

    /// Load the persisted identifier; `Ok(false)` when guest mode is not
    /// configured or no identifier has been generated yet.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the identifier cannot be read.
    pub async fn init(&self, config: &AuthConfig) -> AuthResult<bool> {
        let Some(client_id) = config.guest_client_id() else {
            return Ok(false);
        };

        let key = Self::storage_key(client_id);
        let guest_id = self
            .context
            .store()
            .get_item(&key)
            .await
            .map_err(|source| AuthError::Store {
                operation: "guest.init",
                source,
            })?;

        let roles = if guest_id.is_empty() {
            Vec::new()
        } else {
            debug!(key = %key, "authenticated guest");
            config.guest_roles()
        };

        let authenticated = !guest_id.is_empty();
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Some(GuestState {
            key,
            guest_id,
            roles,
        });
        Ok(authenticated)
    }

    /// Generate and persist a fresh guest identifier, then publish
    /// [`AuthEvent::GuestAuthenticated`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotInitialized`] when [`GuestSession::init`] has not
    /// run with guest mode configured, or [`AuthError::Store`] when the
    /// identifier cannot be persisted.
    pub async fn login(&self, config: &AuthConfig) -> AuthResult<()> {
        debug!("login guest");
        let key = self
            .current()
            .map(|state| state.key)
            .ok_or(AuthError::NotInitialized {
                operation: "guest.login",
            })?;

        let guest_id = Uuid::new_v4().to_string();
        self.context
            .store()
            .set_item(&key, &guest_id)
            .await
            .map_err(|source| AuthError::Store {
                operation: "guest.login",
                source,
            })?;

        let _ = self.init(config).await?;
        let _ = self.context.events().publish(AuthEvent::GuestAuthenticated);
        info!("guest identity created");
        Ok(())
    }

    /// Forget the guest identity and ask the host to reset its context.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Store`] when the identifier cannot be removed.
    pub async fn logout(&self) -> AuthResult<()> {
        debug!("logout guest");
        let Some(state) = self.current() else {
            return Ok(());
        };

        self.context
            .store()
            .remove_item(&state.key)
            .await
            .map_err(|source| AuthError::Store {
                operation: "guest.logout",
                source,
            })?;

        if let Some(current) = self
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            current.guest_id.clear();
            current.roles.clear();
        }
        self.context.navigator().reload();
        Ok(())
    }

    /// Whether [`GuestSession::init`] ran with guest mode configured, so that
    /// [`GuestSession::login`] can persist an identifier.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Whether a guest identifier is present.
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.current()
            .is_some_and(|state| !state.guest_id.is_empty())
    }

    /// Current guest identifier, empty when not authenticated.
    #[must_use]
    pub fn guest_id(&self) -> String {
        self.current().map(|state| state.guest_id).unwrap_or_default()
    }

    /// Role set membership.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|state| state.roles.iter().any(|granted| granted == role))
    }

    fn current(&self) -> Option<GuestState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duet_store::{MemoryStore, Store};
    use std::sync::Arc;

    fn guest_config(roles: Option<Vec<String>>) -> AuthConfig {
        AuthConfig {
            guest_client_id: Some("shop".into()),
            guest_roles: roles,
            ..AuthConfig::default()
        }
    }

    fn context_with(store: MemoryStore) -> AuthContext {
        AuthContext::builder().store(Arc::new(store)).build()
    }

    #[tokio::test]
    async fn init_without_guest_client_is_inactive() {
        let session = GuestSession::new(AuthContext::default());
        assert!(!session.init(&AuthConfig::default()).await.unwrap());
        assert!(!session.is_configured());
        assert!(!session.authenticated());
        let err = session.login(&AuthConfig::default()).await.unwrap_err();
        assert!(err.is_usage_fault());
    }

    #[tokio::test]
    async fn init_without_persisted_id_does_not_generate_one() {
        let store = MemoryStore::new();
        let session = GuestSession::new(context_with(store.clone()));
        assert!(!session.init(&guest_config(None)).await.unwrap());
        assert!(store.is_empty());
        assert!(session.is_configured());
        assert_eq!(session.guest_id(), "");
        assert!(!session.has_role("User"));
    }

    #[tokio::test]
    async fn persisted_id_authenticates_with_default_role() {
        let store = MemoryStore::with_entries([("shop-guestId", "g-1")]);
        let session = GuestSession::new(context_with(store));
        assert!(session.init(&guest_config(None)).await.unwrap());
        assert_eq!(session.guest_id(), "g-1");
        assert!(session.has_role("User"));
        assert!(!session.has_role("admin"));
    }

    #[tokio::test]
    async fn login_persists_uuid_and_publishes() {
        let store = MemoryStore::new();
        let context = context_with(store.clone());
        let session = GuestSession::new(context.clone());
        let config = guest_config(Some(vec!["editor".into()]));
        assert!(!session.init(&config).await.unwrap());

        session.login(&config).await.unwrap();

        let persisted = store.get_item("shop-guestId").await.unwrap();
        assert!(Uuid::parse_str(&persisted).is_ok());
        assert_eq!(session.guest_id(), persisted);
        assert!(session.has_role("editor"));
        assert!(!session.has_role("admin"));
        assert_eq!(context.events().count(AuthEvent::GuestAuthenticated), 1);
    }

    #[tokio::test]
    async fn logout_clears_identifier_and_roles() {
        let store = MemoryStore::with_entries([("shop-guestId", "g-1")]);
        let session = GuestSession::new(context_with(store.clone()));
        assert!(session.init(&guest_config(None)).await.unwrap());

        session.logout().await.unwrap();

        assert!(!store.contains_key("shop-guestId"));
        assert!(!session.authenticated());
        assert!(!session.has_role("User"));
    }
}
