//! Persisted credential bundle
//!
//! The bundle is produced by device registration and is the only thing a
//! caller has to persist between runs. Field names follow the JSON layout the
//! bundle is stored with, so previously saved data loads unchanged.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, StateError};

/// Name of the website cookie that mirrors the store authentication cookie
pub const SESSION_TOKEN_COOKIE: &str = "session-token";

/// Short-lived cookie used to authenticate against the retail site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreAuthenticationCookie {
    pub cookie: String,
}

/// Identity of the virtual device registered for this installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_serial_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    /// Any other metadata returned by the registration endpoint
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Long-lived artifacts obtained after device registration
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialBundle {
    /// Signing token used for request signing
    pub adp_token: String,
    /// Device private key paired with the signing token
    pub device_private_key: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry as unix seconds
    #[serde(rename = "expires")]
    pub access_token_expires: f64,
    #[serde(default)]
    pub website_cookies: BTreeMap<String, String>,
    pub store_authentication_cookie: StoreAuthenticationCookie,
    pub device_info: DeviceInfo,
    #[serde(default)]
    pub customer_info: Value,
    /// Customer owning the account, resolved after registration
    #[serde(default)]
    pub account_customer_id: Option<String>,
    /// Site URL the bundle was obtained for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

impl CredentialBundle {
    /// Load a bundle from its persisted JSON form
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Serialize the bundle for persistence
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Access token expiry as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.access_token_expires * 1000.0) as i64)
    }

    /// True when the access token expires before `now + skew`.
    ///
    /// An expiry or deadline outside the representable range counts as expiring.
    pub fn access_token_expires_within(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        match (self.expires_at(), now.checked_add_signed(skew)) {
            (Some(expires_at), Some(deadline)) => expires_at <= deadline,
            _ => true,
        }
    }

    /// True when the access token is already expired
    pub fn access_token_expired(&self) -> bool {
        self.access_token_expires_within(Utc::now(), Duration::zero())
    }

    /// Replace the access token, computing the expiry from a time-to-live.
    ///
    /// The bundle is left untouched when the lifetime is out of range.
    pub fn set_access_token(&mut self, token: impl Into<String>, expires_in_secs: i64) -> Result<()> {
        let expires = expiry_from_now(expires_in_secs)
            .ok_or(StateError::InvalidExpiry(expires_in_secs))?;
        self.access_token = token.into();
        self.access_token_expires = expires;
        Ok(())
    }

    /// Installation serial number recorded at registration
    pub fn device_serial(&self) -> &str {
        &self.device_info.device_serial_number
    }

    /// Replace the website cookies and re-derive the store authentication
    /// cookie from the session token when one is present
    pub fn replace_website_cookies(&mut self, cookies: BTreeMap<String, String>) {
        if let Some(token) = cookies.get(SESSION_TOKEN_COOKIE) {
            self.store_authentication_cookie = StoreAuthenticationCookie {
                cookie: token.clone(),
            };
        }
        self.website_cookies = cookies;
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("adp_token", &"[REDACTED]")
            .field("device_private_key", &"[REDACTED]")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("access_token_expires", &self.access_token_expires)
            .field("website_cookies", &self.website_cookies.keys().collect::<Vec<_>>())
            .field("device_info", &self.device_info.device_serial_number)
            .field("account_customer_id", &self.account_customer_id.is_some())
            .field("site", &self.site)
            .finish()
    }
}

/// Unix timestamp `expires_in_secs` from now, `None` when out of range
pub fn expiry_from_now(expires_in_secs: i64) -> Option<f64> {
    let expires_in = Duration::try_seconds(expires_in_secs)?;
    let expires_at = Utc::now().checked_add_signed(expires_in)?;
    Some(expires_at.timestamp_millis() as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_json() -> &'static str {
        r#"{
            "adp_token": "adp",
            "device_private_key": "MIIkey",
            "access_token": "Atna|access",
            "refresh_token": "Atnr|refresh",
            "expires": 1700000000.5,
            "website_cookies": {"session-id": "123", "ubid-main": "456"},
            "store_authentication_cookie": {"cookie": "store"},
            "device_info": {
                "device_serial_number": "ABCDEF0123",
                "device_type": "A2IVLV5VM2W81",
                "device_name": "Echo SDK",
                "device_serial_number_hash": "hash"
            },
            "customer_info": {"user_id": "amzn1.account.X", "home_region": "NA"},
            "account_customer_id": "A1CUSTOMER",
            "site": "https://www.amazon.de"
        }"#
    }

    #[test]
    fn test_load_persisted_layout() {
        let bundle = CredentialBundle::from_json(sample_json()).unwrap();
        assert_eq!(bundle.device_serial(), "ABCDEF0123");
        assert_eq!(bundle.account_customer_id.as_deref(), Some("A1CUSTOMER"));
        assert_eq!(bundle.site.as_deref(), Some("https://www.amazon.de"));
        assert_eq!(
            bundle.device_info.extra.get("device_serial_number_hash"),
            Some(&Value::String("hash".to_string()))
        );
    }

    #[test]
    fn test_persisted_keys_are_preserved() {
        let bundle = CredentialBundle::from_json(sample_json()).unwrap();
        let value: Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert!(value.get("expires").is_some());
        assert!(value.get("access_token_expires").is_none());
        assert_eq!(value["device_info"]["device_serial_number_hash"], "hash");
        assert_eq!(CredentialBundle::from_json(&bundle.to_json().unwrap()).unwrap(), bundle);
    }

    #[test]
    fn test_missing_customer_id_defaults_to_none() {
        let mut value: Value = serde_json::from_str(sample_json()).unwrap();
        value.as_object_mut().unwrap().remove("account_customer_id");
        value.as_object_mut().unwrap().remove("site");
        let bundle: CredentialBundle = serde_json::from_value(value).unwrap();
        assert!(bundle.account_customer_id.is_none());
        assert!(bundle.site.is_none());
    }

    #[test]
    fn test_access_token_expiry() {
        let mut bundle = CredentialBundle::from_json(sample_json()).unwrap();
        assert!(bundle.access_token_expired());

        bundle.set_access_token("Atna|fresh", 3600).unwrap();
        assert_eq!(bundle.access_token, "Atna|fresh");
        assert!(!bundle.access_token_expired());
        assert!(bundle.access_token_expires_within(Utc::now(), Duration::hours(2)));
    }

    #[test]
    fn test_out_of_range_lifetime_is_rejected() {
        assert!(expiry_from_now(9_223_372_036_854_775).is_none());
        assert!(expiry_from_now(i64::MAX).is_none());
        assert!(expiry_from_now(3600).is_some());

        let mut bundle = CredentialBundle::from_json(sample_json()).unwrap();
        assert!(matches!(
            bundle.set_access_token("Atna|huge", 9_223_372_036_854_775),
            Err(StateError::InvalidExpiry(_))
        ));
        assert_eq!(bundle.access_token, "Atna|access");
        assert_eq!(bundle.access_token_expires, 1700000000.5);
    }

    #[test]
    fn test_out_of_range_skew_counts_as_expiring() {
        let mut bundle = CredentialBundle::from_json(sample_json()).unwrap();
        bundle.set_access_token("Atna|fresh", 3600).unwrap();
        assert!(bundle.access_token_expires_within(Utc::now(), Duration::weeks(1_000_000_000)));
        assert!(bundle.access_token_expires_within(Utc::now(), Duration::weeks(-1_000_000_000)));
    }

    #[test]
    fn test_replace_website_cookies_updates_store_cookie() {
        let mut bundle = CredentialBundle::from_json(sample_json()).unwrap();
        let mut cookies = BTreeMap::new();
        cookies.insert(SESSION_TOKEN_COOKIE.to_string(), "new-token".to_string());
        bundle.replace_website_cookies(cookies);
        assert_eq!(bundle.store_authentication_cookie.cookie, "new-token");
        assert_eq!(bundle.website_cookies.len(), 1);
    }

    #[test]
    fn test_debug_hides_secrets() {
        let bundle = CredentialBundle::from_json(sample_json()).unwrap();
        let debug = format!("{:?}", bundle);
        assert!(!debug.contains("Atnr|refresh"));
        assert!(!debug.contains("MIIkey"));
        assert!(debug.contains("[REDACTED]"));
    }
}
