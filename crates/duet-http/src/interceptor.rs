//! Request/response hooks.

use std::sync::Arc;

use async_trait::async_trait;
use duet_auth::AuthOrchestrator;
use duet_events::{AuthEvent, EventBus};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tracing::warn;

/// Header carrying the guest identifier.
pub const GUEST_HEADER: &str = "guestid";

/// Supplier of the credential attached to outgoing requests.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Current credential, empty when unauthenticated.
    async fn token(&self) -> String;

    /// Whether the credential is a guest identifier rather than a bearer token.
    fn is_guest(&self) -> bool;
}

#[async_trait]
impl CredentialSource for AuthOrchestrator {
    async fn token(&self) -> String {
        Self::token(self).await
    }

    fn is_guest(&self) -> bool {
        Self::is_guest(self)
    }
}

/// Attaches credentials to requests and reports auth failures on the bus.
#[derive(Clone)]
pub struct CredentialInterceptor {
    source: Arc<dyn CredentialSource>,
    events: EventBus,
}

impl CredentialInterceptor {
    /// Interceptor reading credentials from `source` and publishing onto `events`.
    #[must_use]
    pub fn new(source: Arc<dyn CredentialSource>, events: EventBus) -> Self {
        Self { source, events }
    }

    /// Interceptor wired to an orchestrator and its notification bus.
    #[must_use]
    pub fn from_orchestrator(auth: &AuthOrchestrator) -> Self {
        Self::new(Arc::new(auth.clone()), auth.context().events().clone())
    }

    /// Insert the credential header into `headers`.
    pub async fn attach_headers(&self, headers: &mut HeaderMap) {
        let token = self.source.token().await;
        if token.is_empty() {
            return;
        }

        let (name, value) = if self.source.is_guest() {
            (HeaderName::from_static(GUEST_HEADER), token)
        } else {
            (AUTHORIZATION, format!("Bearer {token}"))
        };
        match HeaderValue::from_str(&value) {
            Ok(mut value) => {
                value.set_sensitive(true);
                let _ = headers.insert(name, value);
            }
            Err(err) => warn!(header = %name, error = %err, "credential is not a valid header value"),
        }
    }

    /// Request hook: `request` with the credential header attached.
    pub async fn attach(&self, request: RequestBuilder) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        self.attach_headers(&mut headers).await;
        request.headers(headers)
    }

    /// Response hook: pass successful responses through; on an error status
    /// publish the matching signal and return the status error.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` status error for any 4xx/5xx response.
    pub fn inspect(&self, response: Response) -> Result<Response, reqwest::Error> {
        let url = response.url().clone();
        response.error_for_status().map_err(|err| {
            self.publish_for(err.status(), Some(&url));
            err
        })
    }

    /// Publish the matching signal for an error carrying a status and return
    /// the error untouched.
    #[must_use]
    pub fn observe_error(&self, error: reqwest::Error) -> reqwest::Error {
        self.publish_for(error.status(), error.url());
        error
    }

    fn publish_for(&self, status: Option<StatusCode>, url: Option<&Url>) {
        let url = url.map(Url::as_str).unwrap_or_default();
        match status {
            Some(StatusCode::UNAUTHORIZED) => {
                warn!(url = %url, "api request requires authentication");
                let _ = self.events.publish(AuthEvent::LoginRequired);
            }
            Some(StatusCode::FORBIDDEN) => {
                warn!(url = %url, "api request requires permission");
                let _ = self.events.publish(AuthEvent::PermissionDenied);
            }
            _ => {}
        }
    }
}
