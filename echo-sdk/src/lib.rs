//! # echo-sdk - Alexa cloud login and session layer
//!
//! Logs in to the Alexa cloud the way the companion mobile app does and keeps
//! the resulting session usable:
//!
//! - **Interactive login**: OAuth sign-in with PKCE, optional one-time
//!   password, virtual device registration
//! - **Stored-data login**: reuse a persisted credential bundle after a
//!   liveness check
//! - **Refresh**: new access tokens and website cookies from the refresh token
//! - **Resilient requests**: cookie and CSRF handling, manual redirects and a
//!   fixed backoff schedule on throttling
//!
//! ## Architecture
//!
//! ```text
//! echo-sdk (EchoClient, config, logging)
//!     ↓
//! echo-auth (login state machine, refresh, discovery)
//!     ↓
//! http-client (request wrapper)
//!     ↓
//! session-state (cookies, CSRF, region, credential bundle)
//! ```

pub use client::EchoClient;
pub use config::ClientConfig;
pub use error::{ErrorKind, Result, SdkError};

pub use echo_auth::{AuthError, Endpoints, LoginStep, RefreshKind, RetryPolicy};
pub use http_client::{
    AgentProfile, AppIdentity, BackoffSchedule, HttpError, ParsedBody, Payload, RawResponse,
    Request, ResponseRecorder, StatusHandling,
};
pub use session_state::{CredentialBundle, Region, Secret, SharedSession};

mod client;
mod config;
mod error;
pub mod logging;
