use echo_auth::AuthError;
use http_client::HttpError;
use session_state::StateError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("Session state error: {0}")]
    State(#[from] StateError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failure category, independent of the layer that raised it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    CannotConnect,
    CannotAuthenticate,
    CannotRegisterDevice,
    CannotRetrieveData,
    WrongMethod,
    InvalidConfig,
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SdkError::Auth(error) => match error {
                AuthError::CannotConnect(_) => ErrorKind::CannotConnect,
                AuthError::CannotAuthenticate(_) => ErrorKind::CannotAuthenticate,
                AuthError::CannotRegisterDevice(_) => ErrorKind::CannotRegisterDevice,
                AuthError::CannotRetrieveData(_) => ErrorKind::CannotRetrieveData,
                AuthError::WrongMethod => ErrorKind::WrongMethod,
            },
            SdkError::Http(error) => match error {
                HttpError::CannotConnect(_) => ErrorKind::CannotConnect,
                HttpError::CannotAuthenticate(_) => ErrorKind::CannotAuthenticate,
                HttpError::CannotRetrieveData(_) => ErrorKind::CannotRetrieveData,
            },
            SdkError::State(_) => ErrorKind::InvalidConfig,
            SdkError::Config(_) => ErrorKind::InvalidConfig,
        }
    }
}

pub type Result<T> = std::result::Result<T, SdkError>;
