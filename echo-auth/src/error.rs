//! Error types for the login flow

use http_client::HttpError;
use session_state::StateError;
use thiserror::Error;

/// Errors raised by login, refresh and account discovery
#[derive(Debug, Error)]
pub enum AuthError {
    /// Transport failure while talking to the service
    #[error("Cannot connect: {0}")]
    CannotConnect(String),

    /// Bad credentials, expired session, or a missing login artifact
    #[error("Cannot authenticate: {0}")]
    CannotAuthenticate(String),

    /// The device registration exchange was rejected
    #[error("Cannot register device: {0}")]
    CannotRegisterDevice(String),

    /// A request succeeded but returned unusable data
    #[error("Cannot retrieve data: {0}")]
    CannotRetrieveData(String),

    /// Stored-data login was requested without stored credentials
    #[error("No stored credentials, use interactive login instead")]
    WrongMethod,
}

/// Type alias for results that can return an AuthError
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<HttpError> for AuthError {
    fn from(error: HttpError) -> Self {
        match error {
            HttpError::CannotConnect(msg) => AuthError::CannotConnect(msg),
            HttpError::CannotAuthenticate(msg) => AuthError::CannotAuthenticate(msg),
            HttpError::CannotRetrieveData(msg) => AuthError::CannotRetrieveData(msg),
        }
    }
}

impl From<StateError> for AuthError {
    fn from(error: StateError) -> Self {
        AuthError::CannotRetrieveData(error.to_string())
    }
}

impl AuthError {
    /// True for failures worth retrying during account discovery
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::CannotRetrieveData(_))
    }
}
