//! Client configuration
//!
//! One struct gathers every tunable of the client: the initial site, the
//! transport settings of the request wrapper, the login flow's discovery
//! policy, the endpoint templates and the app identity presented to the
//! service.

use echo_auth::{Endpoints, RetryPolicy};
use http_client::{AppIdentity, BackoffSchedule, HttpConfig};
use session_state::{Region, DEFAULT_SITE};
use std::time::Duration;

use crate::error::{Result, SdkError};

/// Configuration for [`EchoClient`](crate::EchoClient)
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Site the login starts on; the account's own site is resolved later
    /// Default: https://www.amazon.com
    pub site: String,

    /// Timeout applied to every network call
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Delays before each attempt when the service answers 500, 503 or 429
    /// Default: 0, 1, 2, 5, 8, 12, 21 seconds
    pub backoff: BackoffSchedule,

    /// Maximum number of redirects followed per request
    /// Default: 10
    pub max_redirects: usize,

    /// Retry policy for account customer id discovery
    /// Default: 5 attempts, 2 seconds apart
    pub discovery: RetryPolicy,

    /// Pause between device registration and customer id discovery
    /// Default: 2 seconds
    pub registration_settle: Duration,

    /// Access tokens expiring within this margin are refreshed
    /// Default: 60 seconds
    pub token_refresh_margin: Duration,

    /// Endpoint URL templates
    pub endpoints: Endpoints,

    /// App identity used for user agents, registration and refresh
    pub app: AppIdentity,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            site: DEFAULT_SITE.to_string(),
            timeout: Duration::from_secs(30),
            backoff: BackoffSchedule::default(),
            max_redirects: 10,
            discovery: RetryPolicy::default(),
            registration_settle: Duration::from_secs(2),
            token_refresh_margin: Duration::from_secs(60),
            endpoints: Endpoints::default(),
            app: AppIdentity::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// No waiting anywhere: zero backoff delays, zero settle time, quick
    /// discovery and a short timeout. Meant for tests against a local server.
    pub fn fast_test() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            backoff: BackoffSchedule::fixed(7, Duration::ZERO),
            discovery: RetryPolicy::fixed(3, Duration::ZERO),
            registration_settle: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_discovery_policy(mut self, policy: RetryPolicy) -> Self {
        self.discovery = policy;
        self
    }

    pub fn with_registration_settle(mut self, delay: Duration) -> Self {
        self.registration_settle = delay;
        self
    }

    pub fn with_token_refresh_margin(mut self, margin: Duration) -> Self {
        self.token_refresh_margin = margin;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Point every endpoint at one base URL
    pub fn with_base_url(self, base_url: &str) -> Self {
        self.with_endpoints(Endpoints::with_base_url(base_url))
    }

    pub fn with_app(mut self, app: AppIdentity) -> Self {
        self.app = app;
        self
    }

    /// Transport settings for the request wrapper
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default()
            .with_timeout(self.timeout)
            .with_backoff(self.backoff.clone())
            .with_max_redirects(self.max_redirects)
            .with_app(self.app.clone())
    }

    /// Refresh margin as a signed duration
    pub fn token_skew(&self) -> Result<chrono::Duration> {
        chrono::Duration::from_std(self.token_refresh_margin)
            .map_err(|e| SdkError::Config(format!("Invalid token refresh margin: {}", e)))
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<()> {
        Region::from_site(&self.site)
            .map_err(|e| SdkError::Config(format!("Invalid site: {}", e)))?;

        if self.timeout == Duration::ZERO {
            return Err(SdkError::Config(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        if self.backoff.is_empty() {
            return Err(SdkError::Config(
                "Backoff schedule needs at least one attempt".to_string(),
            ));
        }

        if self.discovery.max_attempts == 0 {
            return Err(SdkError::Config(
                "Discovery policy needs at least one attempt".to_string(),
            ));
        }

        if self.app.device_type.is_empty() {
            return Err(SdkError::Config("Device type must not be empty".to_string()));
        }

        let invalid = self.endpoints.invalid();
        if !invalid.is_empty() {
            return Err(SdkError::Config(format!(
                "Invalid endpoint URLs: {}",
                invalid.join(", ")
            )));
        }

        self.token_skew()?;
        Ok(())
    }
}
