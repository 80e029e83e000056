//! Access token and website cookie refresh
//!
//! Both refreshes trade the long-lived refresh token for something short
//! lived. A rejected refresh is a soft failure: the caller gets `false` and
//! decides whether that matters in context.

use chrono::{Duration, Utc};
use http_client::{AppIdentity, HttpClient, Request};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::endpoints::Endpoints;
use crate::error::Result;
use crate::register::{expires_in_secs, NamedCookie};

/// What to obtain with the refresh token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshKind {
    /// A new short-lived access token
    AccessToken,
    /// A fresh set of website cookies for the active domain
    AuthCookies,
}

impl RefreshKind {
    pub fn requested_token_type(&self) -> &'static str {
        match self {
            RefreshKind::AccessToken => "access_token",
            RefreshKind::AuthCookies => "auth_cookies",
        }
    }
}

/// Form payload of a refresh request
pub fn refresh_payload(
    app: &AppIdentity,
    refresh_token: &str,
    kind: RefreshKind,
    domain: &str,
) -> BTreeMap<String, String> {
    let target_domain = match kind {
        RefreshKind::AccessToken => format!("www.amazon.{}", domain),
        RefreshKind::AuthCookies => format!(".amazon.{}", domain),
    };

    [
        ("app_name", app.app_name.as_str()),
        ("app_version", app.app_version.as_str()),
        ("di.sdk.version", app.sdk_version.as_str()),
        ("source_token", refresh_token),
        ("package_name", app.bundle_id.as_str()),
        ("di.hw.version", app.device_model.as_str()),
        ("platform", "iOS"),
        ("requested_token_type", kind.requested_token_type()),
        ("source_token_type", "refresh_token"),
        ("di.os.name", "iOS"),
        ("di.os.version", app.client_os.as_str()),
        ("current_version", app.sdk_version.as_str()),
        ("previous_version", app.sdk_version.as_str()),
        ("domain", target_domain.as_str()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value.to_string()))
    .collect()
}

/// Refresh the access token or the website cookies.
///
/// Returns `(false, {})` without a network call when no refresh token is
/// held, and `(false, {})` when the service rejects the refresh.
pub async fn refresh(
    client: &HttpClient,
    endpoints: &Endpoints,
    kind: RefreshKind,
) -> Result<(bool, Map<String, Value>)> {
    let (refresh_token, domain) = {
        let session = client.session().read();
        (
            session.refresh_token().map(str::to_string),
            session.domain().to_string(),
        )
    };
    let Some(refresh_token) = refresh_token else {
        tracing::debug!("No login data available, cannot refresh");
        return Ok((false, Map::new()));
    };

    let url = match kind {
        RefreshKind::AccessToken => endpoints.token(&domain),
        RefreshKind::AuthCookies => endpoints.cookie_exchange(&domain),
    };
    let payload = refresh_payload(&client.config().app, &refresh_token, kind, &domain);

    let (_, response) = client
        .send(Request::post(url).form(payload).passthrough())
        .await?;
    tracing::debug!(
        "Refresh {} response status {}",
        kind.requested_token_type(),
        response.status
    );

    if !response.is_success() {
        tracing::debug!("Failed to refresh data");
        return Ok((false, Map::new()));
    }

    let json = response.json()?;
    let applied = match kind {
        RefreshKind::AccessToken => apply_access_token(client, &json)?,
        RefreshKind::AuthCookies => apply_auth_cookies(client, &json),
    };
    if !applied {
        tracing::debug!("Unexpected refresh data response");
        return Ok((false, Map::new()));
    }
    Ok((true, json))
}

/// Refresh the access token when it expires within `skew`.
///
/// Returns true when a usable access token is held afterwards.
pub async fn ensure_access_token(
    client: &HttpClient,
    endpoints: &Endpoints,
    skew: Duration,
) -> Result<bool> {
    let expiring = client
        .session()
        .read()
        .credentials()
        .map(|credentials| credentials.access_token_expires_within(Utc::now(), skew));

    match expiring {
        None => Ok(false),
        Some(false) => Ok(true),
        Some(true) => {
            tracing::debug!("Access token expiring, refreshing");
            let (refreshed, _) = refresh(client, endpoints, RefreshKind::AccessToken).await?;
            Ok(refreshed)
        }
    }
}

fn apply_access_token(client: &HttpClient, json: &Map<String, Value>) -> Result<bool> {
    let Some(token) = json.get("access_token").and_then(Value::as_str) else {
        return Ok(false);
    };
    let expires_in = json.get("expires_in").and_then(expires_in_secs).unwrap_or(0);

    let mut session = client.session().write();
    match session.credentials_mut() {
        Some(credentials) => {
            credentials.set_access_token(token, expires_in)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Cookies grouped by domain from `response.tokens.cookies`
fn cookies_by_domain(json: &Map<String, Value>) -> Option<Vec<(String, NamedCookie)>> {
    let groups = json
        .get("response")?
        .get("tokens")?
        .get("cookies")?
        .as_object()?;

    let mut cookies = Vec::new();
    for (domain, entries) in groups {
        let entries: Vec<NamedCookie> = serde_json::from_value(entries.clone()).ok()?;
        cookies.extend(entries.into_iter().map(|cookie| (domain.clone(), cookie)));
    }
    Some(cookies)
}

fn apply_auth_cookies(client: &HttpClient, json: &Map<String, Value>) -> bool {
    let Some(cookies) = cookies_by_domain(json) else {
        return false;
    };

    let mut session = client.session().write();
    session.cookies_mut().clear();

    let mut website_cookies = BTreeMap::new();
    for (domain, cookie) in cookies {
        let value = session_state::strip_quotes(&cookie.value);
        session.cookies_mut().insert(&domain, cookie.name.clone(), value.clone());
        website_cookies.insert(cookie.name, value);
    }
    tracing::debug!("Refreshed {} website cookies", website_cookies.len());

    if let Some(credentials) = session.credentials_mut() {
        credentials.replace_website_cookies(website_cookies);
    }
    true
}
