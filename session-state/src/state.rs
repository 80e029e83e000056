//! Per-account session state
//!
//! One [`SessionState`] exists per account. The request wrapper and the login
//! flow share it through [`SharedSession`]; the lock is only ever taken in
//! synchronous sections so a CSRF or cookie update is never split across an
//! `.await`.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::cookies::CookieJar;
use crate::credentials::CredentialBundle;
use crate::error::Result;
use crate::redact::obfuscate_email;
use crate::region::{Region, DEFAULT_SITE};

/// Session state shared between the request wrapper and the login flow
pub type SharedSession = Arc<RwLock<SessionState>>;

/// Opaque credential whose `Debug` output never shows the value
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the wrapped value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity, region, cookies and credentials of one logged-in account
pub struct SessionState {
    email: String,
    password: Secret,
    region: Region,
    csrf_token: Option<String>,
    cookies: CookieJar,
    serial: String,
    credentials: Option<CredentialBundle>,
    frc: Option<String>,
}

impl SessionState {
    /// Empty session for an interactive login against the default site
    pub fn new(email: impl Into<String>, password: impl Into<Secret>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            region: Region::default(),
            csrf_token: None,
            cookies: CookieJar::new(),
            serial: new_serial(),
            credentials: None,
            frc: None,
        }
    }

    /// Empty session for an interactive login against a specific site
    pub fn with_site(
        email: impl Into<String>,
        password: impl Into<Secret>,
        site: &str,
    ) -> Result<Self> {
        let mut state = Self::new(email, password);
        state.region = Region::from_site(site)?;
        Ok(state)
    }

    /// Session hydrated from a persisted credential bundle.
    ///
    /// The bundle's `site` selects the region and its device serial is reused
    /// so the registered device keeps its identity.
    pub fn from_credentials(
        email: impl Into<String>,
        password: impl Into<Secret>,
        credentials: CredentialBundle,
    ) -> Result<Self> {
        let site = credentials.site.as_deref().unwrap_or(DEFAULT_SITE);
        let region = Region::from_site(site)?;
        let serial = match credentials.device_serial() {
            "" => new_serial(),
            serial => serial.to_string(),
        };

        let email = email.into();
        tracing::debug!(
            "Hydrating session for {} from stored credentials ({})",
            obfuscate_email(&email),
            region
        );

        Ok(Self {
            email,
            password: password.into(),
            region,
            csrf_token: None,
            cookies: CookieJar::new(),
            serial,
            credentials: Some(credentials),
            frc: None,
        })
    }

    /// Wrap the state for sharing
    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn domain(&self) -> &str {
        &self.region.domain
    }

    pub fn country(&self) -> &str {
        &self.region.country
    }

    pub fn language(&self) -> &str {
        &self.region.language
    }

    /// Site URL of the active region
    pub fn site_url(&self) -> String {
        self.region.site_url()
    }

    /// Per-install device serial number
    pub fn serial(&self) -> &str {
        &self.serial
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    /// Adopt a CSRF token observed in a response.
    ///
    /// Only takes effect while no token is held; returns true when adopted.
    pub fn adopt_csrf(&mut self, token: &str) -> bool {
        if self.csrf_token.is_some() || token.is_empty() {
            return false;
        }
        tracing::debug!("Adopting CSRF token for amazon.{}", self.region.domain);
        self.csrf_token = Some(token.to_string());
        true
    }

    pub fn clear_csrf(&mut self) {
        self.csrf_token = None;
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub fn cookies_mut(&mut self) -> &mut CookieJar {
        &mut self.cookies
    }

    /// Drop the cookie jar and the CSRF token together
    pub fn clear_cookies(&mut self) {
        self.cookies.clear();
        self.csrf_token = None;
    }

    /// Switch to the region of `site`.
    ///
    /// When the domain changes the cookie jar and CSRF token are discarded,
    /// since both are scoped to the previous domain. Returns true on change.
    pub fn apply_site(&mut self, site: &str) -> Result<bool> {
        let region = Region::from_site(site)?;
        if region.domain == self.region.domain {
            return Ok(false);
        }

        tracing::debug!("Switching region from {} to {}", self.region, region);
        self.region = region;
        self.clear_cookies();
        if let Some(credentials) = self.credentials.as_mut() {
            credentials.site = Some(self.region.site_url());
        }
        Ok(true)
    }

    pub fn credentials(&self) -> Option<&CredentialBundle> {
        self.credentials.as_ref()
    }

    pub fn credentials_mut(&mut self) -> Option<&mut CredentialBundle> {
        self.credentials.as_mut()
    }

    /// Replace the credential bundle in one step
    pub fn set_credentials(&mut self, credentials: CredentialBundle) {
        self.credentials = Some(credentials);
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .map(|c| c.refresh_token.as_str())
            .filter(|token| !token.is_empty())
    }

    pub fn account_customer_id(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.account_customer_id.as_deref())
    }

    /// Anti-captcha bootstrap value, generated once per session by `init`
    pub fn frc_or_init(&mut self, init: impl FnOnce() -> String) -> String {
        self.frc.get_or_insert_with(init).clone()
    }
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionState")
            .field("email", &obfuscate_email(&self.email))
            .field("password", &self.password)
            .field("region", &self.region)
            .field("csrf_token", &self.csrf_token.is_some())
            .field("cookies", &self.cookies.len())
            .field("serial", &self.serial)
            .field("credentials", &self.credentials)
            .finish()
    }
}

/// Fresh per-install serial number: an upper-case simple UUID v4
pub fn new_serial() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}
