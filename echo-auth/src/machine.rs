//! Login state machine
//!
//! Interactive login walks the OAuth sign-in pages, registers a virtual
//! device, moves the session to the account's regional domain and resolves
//! the account customer id. Stored-data login only confirms the persisted
//! session is still alive.

use chrono::Duration as ChronoDuration;
use http_client::{generate_frc, AgentProfile, HttpClient, RawResponse, Request};
use reqwest::Method;
use serde_json::{Map, Value};
use session_state::{obfuscate_email, CredentialBundle};
use std::fmt;
use std::time::Duration;

use crate::discovery::{discover_account_customer_id, RetryPolicy};
use crate::domain::resolve_domain;
use crate::endpoints::Endpoints;
use crate::error::{AuthError, Result};
use crate::forms::{find_form, has_element_id, hidden_inputs};
use crate::oauth::{authorization_url, extract_authorization_code};
use crate::pkce::{client_id, PkceChallenge};
use crate::refresh::{self, RefreshKind};
use crate::register::{register_device, Registration};

/// Element id present on the one-time-password challenge page
pub const MFA_MARKER: &str = "auth-mfa-otpcode";

/// Stages of an interactive login, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoginStep {
    Unauthenticated,
    OAuthPageFetched,
    CredentialsSubmitted,
    MfaChallenge,
    AuthorizationCodeObtained,
    DeviceRegistered,
    DomainResolved,
    CustomerIdResolved,
    Authenticated,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStep::Unauthenticated => "unauthenticated",
            LoginStep::OAuthPageFetched => "oauth page fetched",
            LoginStep::CredentialsSubmitted => "credentials submitted",
            LoginStep::MfaChallenge => "mfa challenge",
            LoginStep::AuthorizationCodeObtained => "authorization code obtained",
            LoginStep::DeviceRegistered => "device registered",
            LoginStep::DomainResolved => "domain resolved",
            LoginStep::CustomerIdResolved => "customer id resolved",
            LoginStep::Authenticated => "authenticated",
        };
        write!(f, "{}", name)
    }
}

fn enter(step: LoginStep) {
    tracing::debug!("Login step: {}", step);
}

/// Drives login, liveness and refresh for one session
#[derive(Debug, Clone)]
pub struct LoginFlow {
    client: HttpClient,
    endpoints: Endpoints,
    discovery: RetryPolicy,
    settle_delay: Duration,
    token_skew: ChronoDuration,
}

impl LoginFlow {
    pub fn new(client: HttpClient, endpoints: Endpoints) -> Self {
        Self {
            client,
            endpoints,
            discovery: RetryPolicy::default(),
            settle_delay: Duration::from_secs(2),
            token_skew: ChronoDuration::seconds(60),
        }
    }

    /// Retry policy for account customer id discovery
    pub fn with_discovery_policy(mut self, policy: RetryPolicy) -> Self {
        self.discovery = policy;
        self
    }

    /// Pause between device registration and customer id discovery
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// How close to expiry an access token gets refreshed
    pub fn with_token_skew(mut self, skew: ChronoDuration) -> Self {
        self.token_skew = skew;
        self
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Log in with email and password, answering an OTP challenge with `otp`.
    ///
    /// On success the returned bundle is also stored in the session, carrying
    /// the resolved `site` and `account_customer_id`.
    pub async fn login_interactive(&self, otp: Option<&str>) -> Result<CredentialBundle> {
        let (email, password, serial, domain, region) = {
            let session = self.client.session().read();
            (
                session.email().to_string(),
                session.password().expose().to_string(),
                session.serial().to_string(),
                session.domain().to_string(),
                session.region().clone(),
            )
        };
        tracing::debug!(
            "Logging in for {} [otp code: {}]",
            obfuscate_email(&email),
            otp.is_some()
        );
        enter(LoginStep::Unauthenticated);

        let app = &self.client.config().app;
        let pkce = PkceChallenge::generate();
        let client_id = client_id(&serial, &app.device_type);
        let url = authorization_url(
            &self.endpoints.signin(&domain),
            &self.endpoints.return_to(&domain),
            &region,
            &client_id,
            &pkce,
        )?;

        let (_, page) = self.client.send(Request::get(url)).await?;
        enter(LoginStep::OAuthPageFetched);

        let mut response = self
            .submit_form(&page, [("email", email.as_str()), ("password", password.as_str())])
            .await?;
        enter(LoginStep::CredentialsSubmitted);

        if has_element_id(&response.body, MFA_MARKER) {
            enter(LoginStep::MfaChallenge);
            let otp = otp.ok_or_else(|| {
                AuthError::CannotAuthenticate("One-time password required but not supplied".to_string())
            })?;
            response = self
                .submit_form(
                    &response,
                    [("otpCode", otp), ("mfaSubmit", "Submit"), ("rememberDevice", "false")],
                )
                .await?;
        }

        tracing::debug!("Login response url: {}", response.url);
        let authorization_code = extract_authorization_code(&response)?;
        enter(LoginStep::AuthorizationCodeObtained);

        let frc = self.client.session().write().frc_or_init(generate_frc);
        let bundle = register_device(
            &self.client,
            &self.endpoints.register(&domain),
            &region,
            &Registration {
                authorization_code: &authorization_code,
                code_verifier: &pkce.verifier,
                client_id: &client_id,
                serial: &serial,
                frc: &frc,
            },
        )
        .await?;
        self.client.session().write().set_credentials(bundle);
        enter(LoginStep::DeviceRegistered);

        let site = resolve_domain(&self.client, &self.endpoints).await?;
        if let Some(credentials) = self.client.session().write().credentials_mut() {
            credentials.site = Some(site);
        }
        enter(LoginStep::DomainResolved);

        if !self.settle_delay.is_zero() {
            tracing::debug!("Waiting {:?} for the device to be listed", self.settle_delay);
            tokio::time::sleep(self.settle_delay).await;
        }
        self.resolve_customer_id().await?;
        enter(LoginStep::CustomerIdResolved);

        let bundle = self.stored_bundle()?;
        enter(LoginStep::Authenticated);
        Ok(bundle)
    }

    /// Log in with the credential bundle the session was hydrated from
    pub async fn login_stored(&self) -> Result<CredentialBundle> {
        let (has_credentials, email) = {
            let session = self.client.session().read();
            (session.has_credentials(), session.email().to_string())
        };
        if !has_credentials {
            tracing::debug!("No stored login data, use interactive login instead");
            return Err(AuthError::WrongMethod);
        }
        tracing::debug!("Logging in for {} with stored data", obfuscate_email(&email));

        if !self.check_auth_status().await? {
            return Err(AuthError::CannotAuthenticate(
                "Session no longer authenticated".to_string(),
            ));
        }

        self.resolve_customer_id().await?;

        let site = self.client.session().read().site_url();
        if let Some(credentials) = self.client.session().write().credentials_mut() {
            if credentials.site.is_none() {
                credentials.site = Some(site);
            }
        }
        self.stored_bundle()
    }

    /// Whether the service still considers the session logged in
    pub async fn check_auth_status(&self) -> Result<bool> {
        let domain = self.client.session().read().domain().to_string();
        let request = Request::get(self.endpoints.bootstrap(&domain))
            .with_profile(AgentProfile::Browser)
            .passthrough();
        let (_, response) = self.client.send(request).await?;

        if !response.is_success() {
            tracing::debug!("Session not authenticated: reply error {}", response.status);
            return Ok(false);
        }

        let json = response.json().unwrap_or_default();
        let Some(authentication) = json.get("authentication") else {
            tracing::debug!("Session not authenticated: reply missing authentication");
            return Ok(false);
        };
        let authenticated = authentication
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        tracing::debug!("Session authenticated: {}", authenticated);
        Ok(authenticated)
    }

    /// Refresh the access token or the website cookies
    pub async fn refresh(&self, kind: RefreshKind) -> Result<(bool, Map<String, Value>)> {
        refresh::refresh(&self.client, &self.endpoints, kind).await
    }

    /// Refresh the access token if it is expired or about to be
    pub async fn ensure_access_token(&self) -> Result<bool> {
        refresh::ensure_access_token(&self.client, &self.endpoints, self.token_skew).await
    }

    /// Account customer id, looked up once and kept in the bundle
    pub async fn resolve_customer_id(&self) -> Result<String> {
        let (domain, serial, device_type, known) = {
            let session = self.client.session().read();
            let credentials = session.credentials();
            let serial = credentials
                .map(CredentialBundle::device_serial)
                .filter(|serial| !serial.is_empty())
                .unwrap_or(session.serial())
                .to_string();
            let device_type = credentials
                .and_then(|c| c.device_info.device_type.clone())
                .unwrap_or_else(|| self.client.config().app.device_type.clone());
            (
                session.domain().to_string(),
                serial,
                device_type,
                session.account_customer_id().map(str::to_string),
            )
        };
        if let Some(id) = known {
            return Ok(id);
        }

        let id = discover_account_customer_id(
            &self.client,
            &self.endpoints.devices(&domain),
            &device_type,
            &serial,
            &self.discovery,
        )
        .await?;
        tracing::debug!("Account customer id resolved");

        if let Some(credentials) = self.client.session().write().credentials_mut() {
            credentials.account_customer_id = Some(id.clone());
        }
        Ok(id)
    }

    /// Fill and submit the login form found on `page`
    async fn submit_form<'a, I>(&self, page: &RawResponse, fields: I) -> Result<RawResponse>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let form = find_form(&page.body).ok_or_else(|| {
            AuthError::CannotAuthenticate(format!("Login form not found at {}", page.url))
        })?;
        let mut inputs = hidden_inputs(&page.body).unwrap_or_default();
        inputs.extend(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string())),
        );

        let action = page.url.join(&form.action).map_err(|e| {
            AuthError::CannotAuthenticate(format!("Invalid form action {}: {}", form.action, e))
        })?;
        let method = form_method(&form.method)?;
        tracing::debug!("Submitting login form to {}", action);

        let (_, response) = self
            .client
            .send(Request::new(method, action.as_str()).form(inputs))
            .await?;
        Ok(response)
    }

    fn stored_bundle(&self) -> Result<CredentialBundle> {
        self.client
            .session()
            .read()
            .credentials()
            .cloned()
            .ok_or_else(|| AuthError::CannotAuthenticate("No credentials in session".to_string()))
    }
}

fn form_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| AuthError::CannotAuthenticate(format!("Invalid form method: {}", method)))
}
