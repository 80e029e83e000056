//! Error types for session state derivation

use thiserror::Error;

/// Errors raised while deriving session data
#[derive(Debug, Error)]
pub enum StateError {
    /// The site URL could not be turned into a regional domain
    #[error("Invalid site URL: {0}")]
    InvalidSite(String),

    /// A token lifetime does not fit the representable time range
    #[error("Token lifetime out of range: {0} seconds")]
    InvalidExpiry(i64),
}

/// Type alias for results that can return a StateError
pub type Result<T> = std::result::Result<T, StateError>;
