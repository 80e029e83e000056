//! Device registration: authorization code in, credential bundle out

use http_client::{status_phrase, AppIdentity, HttpClient, Request};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use session_state::{
    expiry_from_now, scrub_fields, strip_quotes, CredentialBundle, DeviceInfo, Region,
    StoreAuthenticationCookie,
};
use std::collections::BTreeMap;

use crate::error::{AuthError, Result};

/// Inputs of one registration exchange
#[derive(Debug, Clone)]
pub struct Registration<'a> {
    pub authorization_code: &'a str,
    pub code_verifier: &'a str,
    pub client_id: &'a str,
    pub serial: &'a str,
    pub frc: &'a str,
}

/// JSON body of the registration request
pub fn registration_body(app: &AppIdentity, region: &Region, registration: &Registration<'_>) -> Value {
    json!({
        "requested_extensions": ["device_info", "customer_info"],
        "cookies": {
            "website_cookies": [],
            "domain": format!(".{}", region.cookie_domain()),
        },
        "registration_data": {
            "domain": "Device",
            "app_version": app.app_version,
            "device_type": app.device_type,
            "device_name": format!("%FIRST_NAME%'s%DUPE_STRATEGY_1ST%{}", app.app_name),
            "os_version": app.client_os,
            "device_serial": registration.serial,
            "device_model": app.device_model,
            "app_name": app.app_name,
            "software_version": app.software_version,
        },
        "auth_data": {
            "use_global_authentication": "true",
            "client_id": registration.client_id,
            "authorization_code": registration.authorization_code,
            "code_verifier": registration.code_verifier,
            "code_algorithm": "SHA-256",
            "client_domain": "DeviceLegacy",
        },
        "user_context_map": {"frc": registration.frc},
        "requested_token_type": [
            "bearer",
            "mac_dms",
            "website_cookies",
            "store_authentication_cookie",
        ],
    })
}

/// Register the virtual device and return its credential bundle
pub async fn register_device(
    client: &HttpClient,
    url: &str,
    region: &Region,
    registration: &Registration<'_>,
) -> Result<CredentialBundle> {
    let body = registration_body(&client.config().app, region, registration);
    let (_, response) = client
        .send(Request::post(url).json(body).passthrough())
        .await?;

    if !response.is_success() {
        let message = response
            .json()
            .ok()
            .and_then(|json| error_message(&json))
            .unwrap_or_else(|| "no error message".to_string());
        tracing::error!("Cannot register device: {}", message);
        return Err(AuthError::CannotRegisterDevice(format!(
            "{}: {}",
            status_phrase(response.status),
            message
        )));
    }

    let bundle = parse_registration(&response.json()?)?;
    tracing::info!("Registered device {}", bundle.device_serial());
    tracing::debug!("Customer info: {}", scrub_fields(&bundle.customer_info));
    Ok(bundle)
}

fn error_message(json: &Map<String, Value>) -> Option<String> {
    json.get("response")?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct Envelope {
    response: SuccessEnvelope,
}

#[derive(Debug, Deserialize)]
struct SuccessEnvelope {
    success: Success,
}

#[derive(Debug, Deserialize)]
struct Success {
    tokens: Tokens,
    extensions: Extensions,
}

#[derive(Debug, Deserialize)]
struct Tokens {
    mac_dms: MacDms,
    bearer: Bearer,
    #[serde(default)]
    website_cookies: Vec<NamedCookie>,
    store_authentication_cookie: StoreAuthenticationCookie,
}

#[derive(Debug, Deserialize)]
struct MacDms {
    adp_token: String,
    device_private_key: String,
}

#[derive(Debug, Deserialize)]
struct Bearer {
    access_token: String,
    refresh_token: String,
    expires_in: Value,
}

/// Cookie entry as returned by the token endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct NamedCookie {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
struct Extensions {
    device_info: DeviceInfo,
    #[serde(default)]
    customer_info: Value,
}

/// Turn a successful registration response into a credential bundle
pub fn parse_registration(json: &Map<String, Value>) -> Result<CredentialBundle> {
    let envelope: Envelope = serde_json::from_value(Value::Object(json.clone())).map_err(|e| {
        AuthError::CannotRegisterDevice(format!("Unexpected registration response: {}", e))
    })?;
    let Success { tokens, extensions } = envelope.response.success;

    let expires_in = expires_in_secs(&tokens.bearer.expires_in).ok_or_else(|| {
        AuthError::CannotRegisterDevice("Registration response lacks token expiry".to_string())
    })?;

    let access_token_expires = expiry_from_now(expires_in).ok_or_else(|| {
        AuthError::CannotRegisterDevice(format!(
            "Registration token expiry out of range: {} seconds",
            expires_in
        ))
    })?;

    let website_cookies: BTreeMap<String, String> = tokens
        .website_cookies
        .into_iter()
        .map(|cookie| (cookie.name, strip_quotes(&cookie.value)))
        .collect();

    Ok(CredentialBundle {
        adp_token: tokens.mac_dms.adp_token,
        device_private_key: tokens.mac_dms.device_private_key,
        access_token: tokens.bearer.access_token,
        refresh_token: tokens.bearer.refresh_token,
        access_token_expires,
        website_cookies,
        store_authentication_cookie: tokens.store_authentication_cookie,
        device_info: extensions.device_info,
        customer_info: extensions.customer_info,
        account_customer_id: None,
        site: None,
    })
}

/// `expires_in` arrives as a string of seconds, occasionally as a number
pub(crate) fn expires_in_secs(value: &Value) -> Option<i64> {
    match value {
        Value::String(secs) => secs.trim().parse().ok(),
        Value::Number(secs) => secs.as_i64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn success_json() -> Map<String, Value> {
        let value = json!({
            "response": {
                "success": {
                    "tokens": {
                        "mac_dms": {"adp_token": "adp", "device_private_key": "key"},
                        "bearer": {
                            "access_token": "Atna|a",
                            "refresh_token": "Atnr|r",
                            "expires_in": "3600"
                        },
                        "website_cookies": [
                            {"Name": "session-id", "Value": "\"131-1\""},
                            {"Name": "ubid-main", "Value": "133-2"}
                        ],
                        "store_authentication_cookie": {"cookie": "store"}
                    },
                    "extensions": {
                        "device_info": {
                            "device_serial_number": "SERIAL",
                            "device_type": "A2IVLV5VM2W81",
                            "device_name": "Someone's Echo SDK"
                        },
                        "customer_info": {"user_id": "amzn1.account.X"}
                    }
                }
            }
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_parse_successful_registration() {
        let bundle = parse_registration(&success_json()).unwrap();
        assert_eq!(bundle.adp_token, "adp");
        assert_eq!(bundle.refresh_token, "Atnr|r");
        assert_eq!(bundle.website_cookies["session-id"], "131-1");
        assert_eq!(bundle.store_authentication_cookie.cookie, "store");
        assert_eq!(bundle.device_serial(), "SERIAL");
        assert!(bundle.account_customer_id.is_none());

        let expected = Utc::now().timestamp() as f64 + 3600.0;
        assert!((bundle.access_token_expires - expected).abs() < 5.0);
    }

    #[test]
    fn test_parse_rejects_incomplete_response() {
        let mut json = success_json();
        json["response"]["success"]["tokens"]
            .as_object_mut()
            .unwrap()
            .remove("bearer");
        assert!(matches!(
            parse_registration(&json),
            Err(AuthError::CannotRegisterDevice(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_range_expiry() {
        let mut json = success_json();
        json["response"]["success"]["tokens"]["bearer"]["expires_in"] = json!("9223372036854775");
        match parse_registration(&json) {
            Err(AuthError::CannotRegisterDevice(message)) => {
                assert!(message.contains("out of range"))
            }
            other => panic!("Expected CannotRegisterDevice, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_body_shape() {
        let app = AppIdentity::default();
        let region = Region::from_site("https://www.amazon.it").unwrap();
        let body = registration_body(
            &app,
            &region,
            &Registration {
                authorization_code: "code",
                code_verifier: "verifier",
                client_id: "abcd",
                serial: "SERIAL",
                frc: "frc",
            },
        );
        assert_eq!(body["cookies"]["domain"], ".amazon.it");
        assert_eq!(body["auth_data"]["authorization_code"], "code");
        assert_eq!(body["auth_data"]["code_verifier"], "verifier");
        assert_eq!(body["auth_data"]["client_id"], "abcd");
        assert_eq!(body["registration_data"]["device_serial"], "SERIAL");
        assert_eq!(body["registration_data"]["device_type"], "A2IVLV5VM2W81");
        assert_eq!(body["user_context_map"]["frc"], "frc");
        assert_eq!(body["requested_token_type"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_expires_in_forms() {
        assert_eq!(expires_in_secs(&json!("3600")), Some(3600));
        assert_eq!(expires_in_secs(&json!(60)), Some(60));
        assert_eq!(expires_in_secs(&json!(null)), None);
    }
}
