//! Transport settings for the request wrapper

use std::time::Duration;

use crate::app::AppIdentity;
use crate::retry::BackoffSchedule;

/// Configuration for [`HttpClient`](crate::HttpClient)
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Timeout applied to every network call
    /// Default: 30 seconds
    pub timeout: Duration,

    /// Maximum number of redirects followed per request
    /// Default: 10
    pub max_redirects: usize,

    /// Delays before each attempt on a retryable status
    /// Default: 0, 1, 2, 5, 8, 12, 21 seconds
    pub backoff: BackoffSchedule,

    /// App identity used for user agents and bootstrap cookies
    pub app: AppIdentity,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_redirects: 10,
            backoff: BackoffSchedule::default(),
            app: AppIdentity::default(),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_app(mut self, app: AppIdentity) -> Self {
        self.app = app;
        self
    }
}
