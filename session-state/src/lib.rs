//! Session state for echo-sdk
//!
//! Pure data with small derivations: the account identity, the region
//! resolved from the active site URL, a domain-scoped cookie jar, the CSRF
//! token, and the persisted [`CredentialBundle`]. Nothing in this crate
//! performs I/O.

pub mod cookies;
pub mod credentials;
pub mod error;
pub mod redact;
pub mod region;
pub mod state;

pub use cookies::{parse_set_cookie, strip_quotes, CookieJar, SetCookie};
pub use credentials::{
    expiry_from_now, CredentialBundle, DeviceInfo, StoreAuthenticationCookie,
    SESSION_TOKEN_COOKIE,
};
pub use error::{Result, StateError};
pub use redact::{obfuscate_email, scrub_fields, scrub_with, REDACTED, TO_REDACT};
pub use region::{language_for_country, Region, DEFAULT_SITE};
pub use state::{new_serial, Secret, SessionState, SharedSession};
