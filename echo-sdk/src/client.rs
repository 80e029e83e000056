//! EchoClient - main entry point of the SDK

use echo_auth::{LoginFlow, RefreshKind};
use http_client::{HttpClient, ParsedBody, RawResponse, Request, ResponseRecorder};
use serde_json::{Map, Value};
use session_state::{CredentialBundle, Secret, SessionState, SharedSession};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::Result;

/// One logged-in (or logging-in) account
///
/// Owns the account's session state and the request wrapper bound to it.
/// Feature code reads the account's domain, language and customer id from
/// here and sends its own requests through [`EchoClient::send`], sharing
/// cookies and CSRF token with the login flow.
///
/// # Example
///
/// ```rust,no_run
/// use echo_sdk::{ClientConfig, CredentialBundle, EchoClient};
///
/// async fn connect(saved: Option<CredentialBundle>) -> Result<EchoClient, echo_sdk::SdkError> {
///     if let Some(bundle) = saved {
///         let client = EchoClient::from_credentials("me@example.com", "secret", bundle, ClientConfig::default())?;
///         if client.login_stored().await.is_ok() {
///             return Ok(client);
///         }
///     }
///
///     let client = EchoClient::new("me@example.com", "secret", ClientConfig::default())?;
///     client.login_interactive(Some("123456")).await?;
///     Ok(client)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct EchoClient {
    flow: LoginFlow,
    config: ClientConfig,
}

impl EchoClient {
    /// Client for an interactive login starting on the configured site
    pub fn new(
        email: impl Into<String>,
        password: impl Into<Secret>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let session = SessionState::with_site(email, password, &config.site)?;
        Self::build(session.shared(), config)
    }

    /// Client hydrated from a persisted credential bundle
    pub fn from_credentials(
        email: impl Into<String>,
        password: impl Into<Secret>,
        credentials: CredentialBundle,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate()?;
        let session = SessionState::from_credentials(email, password, credentials)?;
        Self::build(session.shared(), config)
    }

    fn build(session: SharedSession, config: ClientConfig) -> Result<Self> {
        let http = HttpClient::new(session, config.http_config())?;
        let flow = Self::login_flow(http, &config)?;
        Ok(Self { flow, config })
    }

    fn login_flow(http: HttpClient, config: &ClientConfig) -> Result<LoginFlow> {
        Ok(LoginFlow::new(http, config.endpoints.clone())
            .with_discovery_policy(config.discovery.clone())
            .with_settle_delay(config.registration_settle)
            .with_token_skew(config.token_skew()?))
    }

    /// Hand every final response to `recorder`
    pub fn with_recorder(mut self, recorder: Arc<dyn ResponseRecorder>) -> Result<Self> {
        let http = self.flow.client().clone().with_recorder(recorder);
        self.flow = Self::login_flow(http, &self.config)?;
        Ok(self)
    }

    /// Log in with email and password, answering an OTP challenge with `otp`
    pub async fn login_interactive(&self, otp: Option<&str>) -> Result<CredentialBundle> {
        Ok(self.flow.login_interactive(otp).await?)
    }

    /// Log in with the credential bundle this client was created from
    pub async fn login_stored(&self) -> Result<CredentialBundle> {
        Ok(self.flow.login_stored().await?)
    }

    /// Whether the service still considers the session logged in
    pub async fn check_auth_status(&self) -> Result<bool> {
        Ok(self.flow.check_auth_status().await?)
    }

    /// Refresh the access token or the website cookies
    pub async fn refresh(&self, kind: RefreshKind) -> Result<(bool, Map<String, Value>)> {
        Ok(self.flow.refresh(kind).await?)
    }

    /// Refresh the access token when it is about to expire
    pub async fn ensure_access_token(&self) -> Result<bool> {
        Ok(self.flow.ensure_access_token().await?)
    }

    /// Send a request with the session's cookies, CSRF token and retry policy
    pub async fn send(&self, request: Request) -> Result<(ParsedBody, RawResponse)> {
        Ok(self.flow.client().send(request).await?)
    }

    /// Active regional domain suffix (`com`, `de`, ...)
    pub fn domain(&self) -> String {
        self.session().read().domain().to_string()
    }

    pub fn language(&self) -> String {
        self.session().read().language().to_string()
    }

    pub fn site(&self) -> String {
        self.session().read().site_url()
    }

    pub fn account_customer_id(&self) -> Option<String> {
        self.session().read().account_customer_id().map(str::to_string)
    }

    /// Current credential bundle, ready to persist
    pub fn credentials(&self) -> Option<CredentialBundle> {
        self.session().read().credentials().cloned()
    }

    pub fn session(&self) -> &SharedSession {
        self.flow.client().session()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}
