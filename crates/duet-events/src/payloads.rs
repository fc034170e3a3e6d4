//! Event payloads carried on the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned to each published event.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 64;

/// Signals published when auth state relevant to the UI changes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AuthEvent {
    /// Init found an already valid delegated session.
    #[serde(rename = "isAlreadyAuthenticated")]
    AlreadyAuthenticated,
    /// A guest identity is active (restored at init or freshly created).
    #[serde(rename = "isGuestAuthenticated")]
    GuestAuthenticated,
    /// A request was rejected with 401.
    LoginRequired,
    /// A request was rejected with 403.
    PermissionDenied,
}

impl AuthEvent {
    /// Wire name of the signal.
    #[must_use]
    pub const fn kind(self) -> &'static str {
        match self {
            Self::AlreadyAuthenticated => "isAlreadyAuthenticated",
            Self::GuestAuthenticated => "isGuestAuthenticated",
            Self::LoginRequired => "loginRequired",
            Self::PermissionDenied => "permissionDenied",
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and
/// emission timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Sequential identifier.
    pub id: EventId,
    /// Emission time.
    pub timestamp: DateTime<Utc>,
    /// The signal itself.
    pub event: AuthEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_serialized_name() {
        for event in [
            AuthEvent::AlreadyAuthenticated,
            AuthEvent::GuestAuthenticated,
            AuthEvent::LoginRequired,
            AuthEvent::PermissionDenied,
        ] {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.kind()));
        }
    }
}
