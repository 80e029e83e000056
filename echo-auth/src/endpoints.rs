//! Service endpoints consumed by the login flow
//!
//! Each endpoint is a URL template; `{domain}` is replaced with the active
//! regional domain suffix (`com`, `co.uk`, ...).

use serde::{Deserialize, Serialize};

const DOMAIN_PLACEHOLDER: &str = "{domain}";

/// URL templates for every endpoint the login flow talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// OAuth sign-in page
    pub signin: String,
    /// `openid.return_to` target the sign-in page redirects to
    pub return_to: String,
    /// Device registration
    pub register: String,
    /// Access token refresh
    pub token: String,
    /// Website cookie exchange
    pub cookie_exchange: String,
    /// Regional host discovery
    pub welcome: String,
    /// Authenticated liveness check
    pub bootstrap: String,
    /// Account device list
    pub devices: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            signin: "https://www.amazon.com/ap/signin".to_string(),
            return_to: "https://www.amazon.com/ap/maplanding".to_string(),
            register: "https://api.amazon.com/auth/register".to_string(),
            token: "https://api.amazon.com/auth/token".to_string(),
            cookie_exchange: "https://www.amazon.{domain}/ap/exchangetoken/cookies".to_string(),
            welcome: "https://alexa.amazon.{domain}/api/welcome".to_string(),
            bootstrap: "https://alexa.amazon.{domain}/api/bootstrap?version=0".to_string(),
            devices: "https://alexa.amazon.{domain}/api/devices-v2/device".to_string(),
        }
    }
}

impl Endpoints {
    /// Every endpoint on a single base URL, keeping the default paths
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            signin: format!("{}/ap/signin", base),
            return_to: format!("{}/ap/maplanding", base),
            register: format!("{}/auth/register", base),
            token: format!("{}/auth/token", base),
            cookie_exchange: format!("{}/ap/exchangetoken/cookies", base),
            welcome: format!("{}/api/welcome", base),
            bootstrap: format!("{}/api/bootstrap?version=0", base),
            devices: format!("{}/api/devices-v2/device", base),
        }
    }

    pub fn signin(&self, domain: &str) -> String {
        resolve(&self.signin, domain)
    }

    pub fn return_to(&self, domain: &str) -> String {
        resolve(&self.return_to, domain)
    }

    pub fn register(&self, domain: &str) -> String {
        resolve(&self.register, domain)
    }

    pub fn token(&self, domain: &str) -> String {
        resolve(&self.token, domain)
    }

    pub fn cookie_exchange(&self, domain: &str) -> String {
        resolve(&self.cookie_exchange, domain)
    }

    pub fn welcome(&self, domain: &str) -> String {
        resolve(&self.welcome, domain)
    }

    pub fn bootstrap(&self, domain: &str) -> String {
        resolve(&self.bootstrap, domain)
    }

    pub fn devices(&self, domain: &str) -> String {
        resolve(&self.devices, domain)
    }

    /// Templates that do not parse as absolute URLs once resolved
    pub fn invalid(&self) -> Vec<&str> {
        [
            &self.signin,
            &self.return_to,
            &self.register,
            &self.token,
            &self.cookie_exchange,
            &self.welcome,
            &self.bootstrap,
            &self.devices,
        ]
        .into_iter()
        .filter(|template| url::Url::parse(&resolve(template, "com")).is_err())
        .map(String::as_str)
        .collect()
    }
}

fn resolve(template: &str, domain: &str) -> String {
    template.replace(DOMAIN_PLACEHOLDER, domain)
}
