//! Fake provider client and navigator for driving the auth managers in tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use duet_auth::{
    LoginOptions, LogoutOptions, MinValidity, Navigator, OidcClient, OidcClientFactory,
    ProviderError, ProviderInitOptions, ProviderListener, TokenSet,
};
use duet_config::DelegatedParams;
use url::Url;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scripted behaviour of every client a [`FakeOidcFactory`] creates.
#[derive(Debug, Clone)]
pub struct FakeProviderScript {
    /// Whether the silent init reports an authenticated session.
    pub init_authenticated: bool,
    /// Fail the silent init with this detail.
    pub init_error: Option<String>,
    /// Fail client construction with this detail.
    pub create_error: Option<String>,
    /// Tokens issued by a successful authenticated init.
    pub issued: TokenSet,
    /// Time each `update_token` call spends before answering.
    pub refresh_delay: Duration,
    /// Fail `update_token` with this detail.
    pub refresh_error: Option<String>,
    /// Granted `(resource, role)` pairs.
    pub resource_roles: Vec<(String, String)>,
}

impl Default for FakeProviderScript {
    fn default() -> Self {
        Self {
            init_authenticated: true,
            init_error: None,
            create_error: None,
            issued: TokenSet {
                access_token: Some("access-0".to_string()),
                refresh_token: Some("refresh-0".to_string()),
                id_token: Some("id-0".to_string()),
                expires_at: None,
            },
            refresh_delay: Duration::ZERO,
            refresh_error: None,
            resource_roles: Vec::new(),
        }
    }
}

impl FakeProviderScript {
    /// Init answers "not authenticated" and issues nothing.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            init_authenticated: false,
            ..Self::default()
        }
    }

    /// Init fails with a network error.
    #[must_use]
    pub fn failing_init(mut self, detail: &str) -> Self {
        self.init_error = Some(detail.to_string());
        self
    }

    /// Client construction fails.
    #[must_use]
    pub fn failing_create(mut self, detail: &str) -> Self {
        self.create_error = Some(detail.to_string());
        self
    }

    /// Token renewal fails with a rejection.
    #[must_use]
    pub fn failing_refresh(mut self, detail: &str) -> Self {
        self.refresh_error = Some(detail.to_string());
        self
    }

    /// Each renewal takes `delay`.
    #[must_use]
    pub const fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    /// Issue `tokens` on init.
    #[must_use]
    pub fn issuing(mut self, tokens: TokenSet) -> Self {
        self.issued = tokens;
        self
    }

    /// Grant `role` on `resource`.
    #[must_use]
    pub fn with_resource_role(mut self, resource: &str, role: &str) -> Self {
        self.resource_roles
            .push((resource.to_string(), role.to_string()));
        self
    }
}

/// In-memory provider client following a [`FakeProviderScript`].
pub struct FakeOidcClient {
    params: DelegatedParams,
    script: FakeProviderScript,
    listener: Arc<dyn ProviderListener>,
    tokens: Mutex<TokenSet>,
    authenticated: AtomicBool,
    init_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    init_options: Mutex<Vec<ProviderInitOptions>>,
    refresh_validity: Mutex<Vec<MinValidity>>,
    logins: Mutex<Vec<LoginOptions>>,
    logouts: Mutex<Vec<LogoutOptions>>,
}

impl FakeOidcClient {
    /// Construct a client for `params` reporting to `listener`.
    #[must_use]
    pub fn new(
        params: DelegatedParams,
        script: FakeProviderScript,
        listener: Arc<dyn ProviderListener>,
    ) -> Self {
        Self {
            params,
            script,
            listener,
            tokens: Mutex::new(TokenSet::default()),
            authenticated: AtomicBool::new(false),
            init_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            init_options: Mutex::new(Vec::new()),
            refresh_validity: Mutex::new(Vec::new()),
            logins: Mutex::new(Vec::new()),
            logouts: Mutex::new(Vec::new()),
        }
    }

    /// Number of silent init calls.
    #[must_use]
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `update_token` calls.
    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Options passed to each silent init.
    #[must_use]
    pub fn init_options(&self) -> Vec<ProviderInitOptions> {
        lock(&self.init_options).clone()
    }

    /// Thresholds passed to each `update_token`.
    #[must_use]
    pub fn refresh_validity(&self) -> Vec<MinValidity> {
        lock(&self.refresh_validity).clone()
    }

    /// Recorded login navigations.
    #[must_use]
    pub fn logins(&self) -> Vec<LoginOptions> {
        lock(&self.logins).clone()
    }

    /// Recorded logout navigations.
    #[must_use]
    pub fn logouts(&self) -> Vec<LogoutOptions> {
        lock(&self.logouts).clone()
    }

    /// Fire the provider's token-expired callback.
    pub async fn expire(&self) {
        self.listener.on_token_expired().await;
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        let base = format!(
            "{}/realms/{}/protocol/openid-connect/{path}",
            self.params.auth_url.trim_end_matches('/'),
            self.params.realm
        );
        Url::parse(&base).map_err(|err| ProviderError::Protocol {
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl OidcClient for FakeOidcClient {
    async fn init(&self, options: ProviderInitOptions) -> Result<bool, ProviderError> {
        let _ = self.init_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.init_options).push(options);

        if let Some(detail) = &self.script.init_error {
            return Err(ProviderError::Network {
                detail: detail.clone(),
            });
        }
        if !self.script.init_authenticated {
            return Ok(false);
        }

        let issued = self.script.issued.clone();
        *lock(&self.tokens) = issued.clone();
        self.authenticated.store(true, Ordering::SeqCst);
        self.listener.on_auth_success(&issued).await;
        Ok(true)
    }

    async fn update_token(&self, min_validity: MinValidity) -> Result<bool, ProviderError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.refresh_validity).push(min_validity);
        if !self.script.refresh_delay.is_zero() {
            tokio::time::sleep(self.script.refresh_delay).await;
        }

        if let Some(detail) = &self.script.refresh_error {
            return Err(ProviderError::Rejected {
                detail: detail.clone(),
            });
        }

        let renewed = {
            let mut tokens = lock(&self.tokens);
            tokens.access_token = Some(format!("access-{call}"));
            tokens.clone()
        };
        self.listener.on_auth_refresh_success(&renewed).await;
        Ok(true)
    }

    fn tokens(&self) -> TokenSet {
        lock(&self.tokens).clone()
    }

    fn authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn has_resource_role(&self, role: &str, resource: &str) -> bool {
        self.script
            .resource_roles
            .iter()
            .any(|(granted_resource, granted_role)| {
                granted_resource == resource && granted_role == role
            })
    }

    async fn login(&self, options: LoginOptions) -> Result<(), ProviderError> {
        lock(&self.logins).push(options);
        Ok(())
    }

    fn create_login_url(&self, options: &LoginOptions) -> Result<String, ProviderError> {
        let mut url = self.endpoint("auth")?;
        {
            let mut query = url.query_pairs_mut();
            let _ = query
                .append_pair("client_id", &self.params.app_client_id)
                .append_pair("redirect_uri", &options.redirect_uri)
                .append_pair("response_type", "code");
            if let Some(hint) = &options.idp_hint {
                let _ = query.append_pair("kc_idp_hint", hint);
            }
        }
        Ok(url.into())
    }

    fn create_logout_url(&self, options: &LogoutOptions) -> Result<String, ProviderError> {
        let mut url = self.endpoint("logout")?;
        let _ = url
            .query_pairs_mut()
            .append_pair("client_id", &self.params.app_client_id)
            .append_pair("post_logout_redirect_uri", &options.redirect_uri);
        Ok(url.into())
    }

    async fn logout(&self, options: LogoutOptions) -> Result<(), ProviderError> {
        lock(&self.logouts).push(options);
        *lock(&self.tokens) = TokenSet::default();
        self.authenticated.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`FakeOidcClient`]s and keeping them for inspection.
#[derive(Default)]
pub struct FakeOidcFactory {
    script: FakeProviderScript,
    clients: Mutex<Vec<Arc<FakeOidcClient>>>,
    create_calls: AtomicUsize,
}

impl FakeOidcFactory {
    /// Factory whose clients follow `script`.
    #[must_use]
    pub fn new(script: FakeProviderScript) -> Self {
        Self {
            script,
            clients: Mutex::new(Vec::new()),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Number of `create` calls, successful or not.
    #[must_use]
    pub fn created(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Most recently created client.
    #[must_use]
    pub fn last_client(&self) -> Option<Arc<FakeOidcClient>> {
        lock(&self.clients).last().cloned()
    }
}

impl OidcClientFactory for FakeOidcFactory {
    fn create(
        &self,
        params: &DelegatedParams,
        listener: Arc<dyn ProviderListener>,
    ) -> Result<Arc<dyn OidcClient>, ProviderError> {
        let _ = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = &self.script.create_error {
            return Err(ProviderError::Network {
                detail: detail.clone(),
            });
        }
        let client = Arc::new(FakeOidcClient::new(
            params.clone(),
            self.script.clone(),
            listener,
        ));
        lock(&self.clients).push(Arc::clone(&client));
        Ok(client as Arc<dyn OidcClient>)
    }
}

/// Navigator that records reload requests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    location: String,
    reloads: AtomicUsize,
}

impl RecordingNavigator {
    /// Navigator reporting `location` as the current location.
    #[must_use]
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            reloads: AtomicUsize::new(0),
        }
    }

    /// Number of reload requests.
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn current_location(&self) -> String {
        self.location.clone()
    }

    fn reload(&self) {
        let _ = self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    #[async_trait]
    impl ProviderListener for Silent {
        async fn on_auth_success(&self, _tokens: &TokenSet) {}
        async fn on_auth_refresh_success(&self, _tokens: &TokenSet) {}
        async fn on_token_expired(&self) {}
    }

    fn params() -> DelegatedParams {
        DelegatedParams {
            auth_url: "https://id.example.com/".into(),
            realm: "main".into(),
            app_client_id: "app1".into(),
            api_client_id: None,
        }
    }

    #[test]
    fn login_url_carries_redirect_and_hint() {
        let client =
            FakeOidcClient::new(params(), FakeProviderScript::default(), Arc::new(Silent));
        let url = client
            .create_login_url(&LoginOptions {
                redirect_uri: "https://app.example.com/home".into(),
                idp_hint: Some("google".into()),
            })
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/realms/main/protocol/openid-connect/auth");
        let pairs: Vec<_> = parsed.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("redirect_uri".into(), "https://app.example.com/home".into())));
        assert!(pairs.contains(&("kc_idp_hint".into(), "google".into())));
    }

    #[tokio::test]
    async fn refresh_rotates_access_token() {
        let client =
            FakeOidcClient::new(params(), FakeProviderScript::default(), Arc::new(Silent));
        let options =
            ProviderInitOptions::from_overrides(&Default::default(), TokenSet::default());
        assert!(client.init(options).await.unwrap());
        assert!(client.update_token(MinValidity::Expired).await.unwrap());
        assert_eq!(client.tokens().access_token.as_deref(), Some("access-1"));
        assert_eq!(client.refresh_validity(), vec![MinValidity::Expired]);
    }
}
