//! Identity of the mobile application the client presents itself as
//!
//! The service only accepts the device-registration protocol from its own
//! companion app, so every request carries that app's identity in its
//! user agent, bootstrap cookies and token payloads.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Number of random bytes in the anti-captcha `frc` cookie
pub const FRC_BYTES: usize = 313;

/// Fixed anti-captcha cookie names
pub const APP_ID_COOKIE: &str = "amzn-app-id";
pub const FRC_COOKIE: &str = "frc";
pub const MAP_MD_COOKIE: &str = "map-md";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36 Edg/141.0.0.0";

/// Application and device constants sent to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
    pub bundle_id: String,
    pub client_os: String,
    pub device_type: String,
    pub device_model: String,
    pub software_version: String,
    pub sdk_version: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            app_id: "MAPiOSLib/6.0/ToHideRetailLink".to_string(),
            app_name: "EchoSdk".to_string(),
            app_version: "2.2.663733.0".to_string(),
            bundle_id: "com.amazon.echo".to_string(),
            client_os: "18.5".to_string(),
            device_type: "A2IVLV5VM2W81".to_string(),
            device_model: "iPhone".to_string(),
            software_version: "35602678".to_string(),
            sdk_version: "6.12.4".to_string(),
        }
    }
}

impl AppIdentity {
    /// User agent of the app's embedded web view
    pub fn app_user_agent(&self) -> String {
        format!(
            "AmazonWebView/AmazonAlexa/{}/iOS/{}/iPhone",
            self.app_version, self.client_os
        )
    }

    /// Desktop browser user agent, for endpoints that reject the web view
    pub fn browser_user_agent(&self) -> &'static str {
        BROWSER_USER_AGENT
    }

    /// Unpadded base64 of the app metadata JSON carried by the `map-md` cookie
    pub fn map_md(&self) -> String {
        let metadata = json!({
            "device_user_dictionary": [],
            "device_registration_data": {
                "software_version": self.software_version,
            },
            "app_identifier": {
                "app_version": self.app_version,
                "bundle_id": self.bundle_id,
            },
        });
        STANDARD_NO_PAD.encode(metadata.to_string())
    }

    /// Cookies sent before any credentials exist to avoid captcha challenges
    pub fn bootstrap_cookies(&self, frc: &str) -> Vec<(String, String)> {
        vec![
            (APP_ID_COOKIE.to_string(), self.app_id.clone()),
            (FRC_COOKIE.to_string(), frc.to_string()),
            (MAP_MD_COOKIE.to_string(), self.map_md()),
        ]
    }
}

/// Fresh `frc` value: unpadded base64 of random bytes
pub fn generate_frc() -> String {
    let mut bytes = [0u8; FRC_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD_NO_PAD.encode(bytes)
}
