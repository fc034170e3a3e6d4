//! Configuration and context fixtures.

use std::sync::Arc;

use duet_auth::{AuthContext, Navigator};
use duet_config::AuthConfig;
use duet_store::MemoryStore;

/// Identity provider URL used by the fixtures.
pub const AUTH_URL: &str = "https://id.example.com";
/// Realm used by the fixtures.
pub const REALM: &str = "main";

/// Route auth-crate logs through the test harness capture at `debug`.
pub fn init_tracing() {
    duet_telemetry::init_test_logging();
}

/// Complete delegated-mode configuration for `app_client_id`.
#[must_use]
pub fn delegated_config(app_client_id: &str) -> AuthConfig {
    AuthConfig {
        auth_url: Some(AUTH_URL.to_string()),
        realm: Some(REALM.to_string()),
        app_client_id: Some(app_client_id.to_string()),
        ..AuthConfig::default()
    }
}

/// Guest-only configuration; `roles` of `None` falls back to the default role.
#[must_use]
pub fn guest_config(guest_client_id: &str, roles: Option<&[&str]>) -> AuthConfig {
    AuthConfig {
        guest_client_id: Some(guest_client_id.to_string()),
        guest_roles: roles.map(|roles| roles.iter().map(ToString::to_string).collect()),
        ..AuthConfig::default()
    }
}

/// Configuration enabling both modes.
#[must_use]
pub fn combined_config(app_client_id: &str, guest_client_id: &str) -> AuthConfig {
    AuthConfig {
        guest_client_id: Some(guest_client_id.to_string()),
        ..delegated_config(app_client_id)
    }
}

/// Store pre-populated with the three persisted tokens of `app_client_id`.
#[must_use]
pub fn store_with_tokens(app_client_id: &str, access: &str, refresh: &str, id: &str) -> MemoryStore {
    MemoryStore::with_entries([
        (format!("{app_client_id}-accessToken"), access),
        (format!("{app_client_id}-refreshToken"), refresh),
        (format!("{app_client_id}-idToken"), id),
    ])
}

/// Context over `store` and `navigator` with a fresh event bus.
#[must_use]
pub fn context_with(store: &MemoryStore, navigator: Arc<dyn Navigator>) -> AuthContext {
    AuthContext::builder()
        .store(Arc::new(store.clone()))
        .navigator(navigator)
        .build()
}
