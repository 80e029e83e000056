//! Redaction helpers for diagnostic output
//!
//! Payloads are logged at debug level during login. Anything identifying the
//! account owner goes through [`scrub_fields`] first, and email addresses are
//! always shown through [`obfuscate_email`].

use serde_json::Value;

/// Keys whose values are replaced wholesale when scrubbing a payload
pub const TO_REDACT: &[&str] = &[
    "access_token",
    "address",
    "address1",
    "address2",
    "address3",
    "adp_token",
    "authorization_code",
    "city",
    "code_verifier",
    "county",
    "customerId",
    "device_private_key",
    "deviceAccountId",
    "deviceAddress",
    "deviceOwnerCustomerId",
    "given_name",
    "name",
    "otpCode",
    "password",
    "postalCode",
    "refresh_token",
    "searchCustomerId",
    "source_token",
    "state",
    "street",
    "user_id",
];

/// Replacement written in place of redacted values
pub const REDACTED: &str = "[REDACTED]";

const EMAIL_KEY: &str = "email";
const INVALID_EMAIL: &str = "[invalid email]";

/// Partially mask an email address: `john.doe@example.com` → `j***.d**@e******.com`
pub fn obfuscate_email(email: &str) -> String {
    let Some((user, domain)) = email.split_once('@') else {
        return INVALID_EMAIL.to_string();
    };
    if domain.contains('@') {
        return INVALID_EMAIL.to_string();
    }
    let Some((domain_name, extension)) = domain.rsplit_once('.') else {
        return INVALID_EMAIL.to_string();
    };

    let user = user
        .split('.')
        .map(mask_part)
        .collect::<Vec<_>>()
        .join(".");
    format!("{}@{}.{}", user, mask_part(domain_name), extension)
}

fn mask_part(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) if part.chars().count() > 1 => {
            format!("{}{}", first, "*".repeat(chars.count()))
        }
        _ => "*".repeat(part.chars().count()),
    }
}

/// Deep copy of `value` with [`TO_REDACT`] keys replaced and emails masked
pub fn scrub_fields(value: &Value) -> Value {
    scrub_with(value, TO_REDACT, REDACTED)
}

/// Deep copy of `value` with the given keys replaced by `replacement`
pub fn scrub_with(value: &Value, field_names: &[&str], replacement: &str) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let scrubbed = if key == EMAIL_KEY {
                        match inner {
                            Value::String(email) => Value::String(obfuscate_email(email)),
                            _ => Value::String(INVALID_EMAIL.to_string()),
                        }
                    } else if field_names.contains(&key.as_str()) {
                        Value::String(replacement.to_string())
                    } else {
                        scrub_with(inner, field_names, replacement)
                    };
                    (key.clone(), scrubbed)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| scrub_with(item, field_names, replacement))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("user@example.com", "u***@e******.com")]
    #[case("john.doe@example.co.uk", "j***.d**@e*********.uk")]
    #[case("a@b.io", "*@*.io")]
    #[case("not-an-email", "[invalid email]")]
    #[case("user@localhost", "[invalid email]")]
    #[case("a@b@c.com", "[invalid email]")]
    fn test_obfuscate_email(#[case] email: &str, #[case] expected: &str) {
        assert_eq!(obfuscate_email(email), expected);
    }

    #[test]
    fn test_scrub_nested_payload() {
        let payload = json!({
            "email": "user@example.com",
            "password": "hunter2",
            "devices": [
                {"deviceOwnerCustomerId": "A1", "serialNumber": "S1"},
                {"name": "Kitchen", "deviceType": "A2"}
            ],
            "nested": {"address": {"street": "Main"}, "keep": 1}
        });

        let scrubbed = scrub_fields(&payload);
        assert_eq!(scrubbed["email"], "u***@e******.com");
        assert_eq!(scrubbed["password"], REDACTED);
        assert_eq!(scrubbed["devices"][0]["deviceOwnerCustomerId"], REDACTED);
        assert_eq!(scrubbed["devices"][0]["serialNumber"], "S1");
        assert_eq!(scrubbed["devices"][1]["name"], REDACTED);
        assert_eq!(scrubbed["nested"]["address"], REDACTED);
        assert_eq!(scrubbed["nested"]["keep"], 1);

        // Input is left untouched
        assert_eq!(payload["password"], "hunter2");
    }

    #[test]
    fn test_scrub_token_material() {
        let payload = json!({
            "source_token": "Atnr|refresh",
            "auth_data": {
                "authorization_code": "ANcode",
                "code_verifier": "verifier-value",
                "client_id": "abcd"
            },
            "otpCode": "123456"
        });

        let scrubbed = scrub_fields(&payload).to_string();
        for secret in ["Atnr|refresh", "ANcode", "verifier-value", "123456"] {
            assert!(!scrubbed.contains(secret), "{} leaked", secret);
        }
        assert!(scrubbed.contains("abcd"));
    }

    proptest! {
        #[test]
        fn obfuscated_email_never_leaks_user_part(
            user in "[a-z]{2,12}",
            host in "[a-z]{2,12}",
        ) {
            let masked = obfuscate_email(&format!("{}@{}.com", user, host));
            let local = masked.split('@').next().unwrap_or_default();
            prop_assert!(!local.contains(&user));
            prop_assert!(masked.ends_with(".com"));
            prop_assert_eq!(masked.len(), user.len() + host.len() + 5);
        }
    }
}
