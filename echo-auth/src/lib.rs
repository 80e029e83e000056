//! Authentication for echo-sdk
//!
//! Interactive OAuth/PKCE login with device registration, stored-data login
//! with a liveness check, access token and website cookie refresh, and
//! account customer id discovery. Every network call goes through the
//! [`http_client::HttpClient`] bound to the account's session.

pub mod discovery;
pub mod domain;
pub mod endpoints;
mod error;
pub mod forms;
pub mod machine;
pub mod oauth;
pub mod pkce;
pub mod refresh;
pub mod register;

pub use discovery::{discover_account_customer_id, find_account_customer_id, retry, RetryPolicy};
pub use domain::{resolve_domain, site_from_host};
pub use endpoints::Endpoints;
pub use error::{AuthError, Result};
pub use forms::{find_form, has_element_id, hidden_inputs, FormTarget};
pub use machine::{LoginFlow, LoginStep, MFA_MARKER};
pub use oauth::{authorization_url, extract_authorization_code, AUTHORIZATION_CODE_PARAM};
pub use pkce::{client_id, PkceChallenge};
pub use refresh::{ensure_access_token, refresh, refresh_payload, RefreshKind};
pub use register::{parse_registration, register_device, registration_body, Registration};
