//! `reqwest` client with both credential hooks installed.

use duet_auth::AuthOrchestrator;
use reqwest::{Client, IntoUrl, Method, RequestBuilder, Response};

use crate::interceptor::CredentialInterceptor;

/// HTTP client that attaches the current credential to every request and
/// reports 401/403 responses on the notification bus.
#[derive(Clone)]
pub struct AuthenticatedClient {
    client: Client,
    interceptor: CredentialInterceptor,
}

impl AuthenticatedClient {
    /// Wrap `client` with `interceptor`.
    #[must_use]
    pub const fn new(client: Client, interceptor: CredentialInterceptor) -> Self {
        Self {
            client,
            interceptor,
        }
    }

    /// Default `reqwest` client wired to `auth`.
    #[must_use]
    pub fn for_orchestrator(auth: &AuthOrchestrator) -> Self {
        Self::new(Client::new(), CredentialInterceptor::from_orchestrator(auth))
    }

    /// Start a request; send it with [`AuthenticatedClient::send`].
    pub fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Start a `GET` request.
    pub fn get(&self, url: impl IntoUrl) -> RequestBuilder {
        self.client.get(url)
    }

    /// Attach the credential, send, and run the response hook.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or the status error for 4xx/5xx responses
    /// after the matching auth signal has been published.
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, reqwest::Error> {
        let response = self
            .interceptor
            .attach(request)
            .await
            .send()
            .await
            .map_err(|err| self.interceptor.observe_error(err))?;
        self.interceptor.inspect(response)
    }

    /// Credential hooks.
    #[must_use]
    pub const fn interceptor(&self) -> &CredentialInterceptor {
        &self.interceptor
    }
}
