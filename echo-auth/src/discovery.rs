//! Account customer id discovery
//!
//! Right after registration the new virtual device may not be listed yet, so
//! the device list is polled under a [`RetryPolicy`] until the entry owning
//! this installation's serial shows up.

use http_client::HttpClient;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

use crate::error::{AuthError, Result};

/// Bounded retry with a delay between attempts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts
    pub max_attempts: u32,
    /// Base delay between attempts
    pub delay: Duration,
    /// Whether to double the delay after every attempt
    pub exponential_backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Single attempt
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
            exponential_backoff: false,
        }
    }

    /// Same delay before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            exponential_backoff: false,
        }
    }

    /// Doubling delay before every retry
    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            delay: base_delay,
            exponential_backoff: true,
        }
    }

    /// Delay before a given attempt; the first attempt (0) is immediate
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 || attempt >= self.max_attempts {
            return Duration::ZERO;
        }

        if self.exponential_backoff {
            self.delay * 2_u32.saturating_pow(attempt - 1)
        } else {
            self.delay
        }
    }
}

/// Run `operation` until it yields a value.
///
/// `Ok(None)` and [`AuthError::CannotRetrieveData`] both count as "not yet"
/// and are retried; any other error propagates immediately. Exhausting the
/// policy is a [`AuthError::CannotRetrieveData`].
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let mut last_error = None;
    for attempt in 0..policy.max_attempts {
        let delay = policy.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tracing::debug!("Retrying {} in {:?} (attempt {})", what, delay, attempt + 1);
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(error) if error.is_retryable() => {
                tracing::debug!("Attempt {} for {} failed: {}", attempt + 1, what, error);
                last_error = Some(error);
            }
            Err(error) => return Err(error),
        }
    }

    let reason = last_error
        .map(|error| format!(": {}", error))
        .unwrap_or_default();
    Err(AuthError::CannotRetrieveData(format!(
        "Unable to resolve {} after {} attempts{}",
        what, policy.max_attempts, reason
    )))
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceEntry {
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    device_owner_customer_id: Option<String>,
    #[serde(default)]
    app_device_list: Vec<AppDevice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppDevice {
    #[serde(default)]
    serial_number: Option<String>,
}

/// Owner of the device list entry of `device_type` that lists `serial`
/// among its app devices
pub fn find_account_customer_id(
    devices: &Map<String, Value>,
    device_type: &str,
    serial: &str,
) -> Option<String> {
    let list: DeviceList = serde_json::from_value(Value::Object(devices.clone())).ok()?;
    list.devices
        .into_iter()
        .filter(|device| device.device_type.as_deref() == Some(device_type))
        .find(|device| {
            device
                .app_device_list
                .iter()
                .any(|app| app.serial_number.as_deref() == Some(serial))
        })
        .and_then(|device| device.device_owner_customer_id)
}

/// Poll the device list until the account customer id can be resolved
pub async fn discover_account_customer_id(
    client: &HttpClient,
    devices_url: &str,
    device_type: &str,
    serial: &str,
    policy: &RetryPolicy,
) -> Result<String> {
    retry(policy, "account customer id", |attempt| async move {
        tracing::debug!("Looking up account customer id (attempt {})", attempt + 1);
        let devices = client.get_json(devices_url).await?;
        Ok(find_account_customer_id(&devices, device_type, serial))
    })
    .await
}
