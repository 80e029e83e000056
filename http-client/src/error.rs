//! Error types for the HTTP request wrapper

use thiserror::Error;

/// Errors that can occur while talking to the cloud service
#[derive(Debug, Error)]
pub enum HttpError {
    /// Transport failure: timeout, refused or reset connection
    #[error("Cannot connect: {0}")]
    CannotConnect(String),

    /// Credentials or session were rejected (401, 403, 407)
    #[error("Cannot authenticate: {0}")]
    CannotAuthenticate(String),

    /// The request went through but the status or body is unusable
    #[error("Cannot retrieve data: {0}")]
    CannotRetrieveData(String),
}

/// Type alias for results that can return an HttpError
pub type Result<T> = std::result::Result<T, HttpError>;

impl HttpError {
    /// Map a reqwest transport failure
    pub(crate) fn from_transport(method: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            HttpError::CannotConnect(format!("Timeout during {}", method))
        } else {
            HttpError::CannotConnect(format!("Connection error during {}", method))
        }
    }
}
