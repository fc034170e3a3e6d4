//! Shared collaborators handed to every session manager.
//!
//! # Design
//! - One context is built at startup and cloned into the managers; nothing in
//!   this crate reaches for process-wide singletons.
//! - Navigation is a capability: the core asks for a reload or the current
//!   location, the host decides what that means.

use std::fmt;
use std::sync::Arc;

use duet_events::EventBus;
use duet_store::{MemoryStore, Store};
use tracing::debug;

/// Navigation capability supplied by the host application.
pub trait Navigator: Send + Sync {
    /// Location used as the default redirect target for login/logout.
    fn current_location(&self) -> String;

    /// Reset the application context (a page reload in browsers).
    fn reload(&self);
}

/// Navigator for hosts without a page: fixed location, reloads are logged only.
#[derive(Debug, Clone, Default)]
pub struct StaticNavigator {
    location: String,
}

impl StaticNavigator {
    /// Construct a navigator reporting `location` as the current location.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

impl Navigator for StaticNavigator {
    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn reload(&self) {
        debug!(location = %self.location, "reload requested without a page context");
    }
}

/// Store, notification bus and navigation shared by the auth components.
#[derive(Clone)]
pub struct AuthContext {
    store: Arc<dyn Store>,
    events: EventBus,
    navigator: Arc<dyn Navigator>,
}

impl AuthContext {
    /// Start building a context; unset collaborators fall back to defaults.
    #[must_use]
    pub fn builder() -> AuthContextBuilder {
        AuthContextBuilder::default()
    }

    /// Credential store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Notification bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Navigation capability.
    #[must_use]
    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }
}

impl Default for AuthContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthContext")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthContext`].
#[derive(Default)]
pub struct AuthContextBuilder {
    store: Option<Arc<dyn Store>>,
    events: Option<EventBus>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl AuthContextBuilder {
    /// Use `store` for credential persistence (default: [`MemoryStore`]).
    #[must_use]
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Publish onto `events` (default: a fresh bus).
    #[must_use]
    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Use `navigator` for redirects and reloads (default: [`StaticNavigator`]).
    #[must_use]
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Finish the context.
    #[must_use]
    pub fn build(self) -> AuthContext {
        AuthContext {
            store: self
                .store
                .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn Store>),
            events: self.events.unwrap_or_default(),
            navigator: self
                .navigator
                .unwrap_or_else(|| Arc::new(StaticNavigator::default()) as Arc<dyn Navigator>),
        }
    }
}
