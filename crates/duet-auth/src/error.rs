//! Error types for session orchestration.

use duet_store::StoreError;
use thiserror::Error;

/// Failures reported by an external OIDC client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The identity provider could not be reached.
    #[error("identity provider unreachable: {detail}")]
    Network {
        /// Transport detail.
        detail: String,
    },
    /// The identity provider answered with something the client could not use.
    #[error("identity provider protocol error: {detail}")]
    Protocol {
        /// Protocol detail.
        detail: String,
    },
    /// The identity provider refused the request (expired refresh token, bad client).
    #[error("identity provider rejected the request: {detail}")]
    Rejected {
        /// Rejection detail.
        detail: String,
    },
}

/// Primary error type for auth operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// An operation ran before `init` recorded a configuration or session.
    /// This is a call-order bug in the host, not a runtime condition.
    #[error("{operation} called before auth init")]
    NotInitialized {
        /// Operation identifier.
        operation: &'static str,
    },
    /// The identity provider call failed.
    #[error("identity provider call failed")]
    Provider {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying provider error.
        #[source]
        source: ProviderError,
    },
    /// The credential store call failed.
    #[error("credential store call failed")]
    Store {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },
}

impl AuthError {
    /// Whether this error signals a call-order bug rather than a runtime failure.
    #[must_use]
    pub const fn is_usage_fault(&self) -> bool {
        matches!(self, Self::NotInitialized { .. })
    }

    /// Operation that was being performed when the error occurred.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::NotInitialized { operation }
            | Self::Provider { operation, .. }
            | Self::Store { operation, .. } => operation,
        }
    }
}

/// Convenience alias for auth results.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_fault_is_distinct_from_runtime_failures() {
        let fault = AuthError::NotInitialized {
            operation: "auth.login_guest",
        };
        assert!(fault.is_usage_fault());
        assert_eq!(fault.to_string(), "auth.login_guest called before auth init");

        let provider = AuthError::Provider {
            operation: "delegated.login",
            source: ProviderError::Network {
                detail: "timeout".into(),
            },
        };
        assert!(!provider.is_usage_fault());
        assert_eq!(provider.operation(), "delegated.login");
        let source = std::error::Error::source(&provider).expect("source present");
        assert_eq!(source.to_string(), "identity provider unreachable: timeout");
    }
}
