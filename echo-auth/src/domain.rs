//! Regional domain resolution after registration

use http_client::HttpClient;
use serde_json::{Map, Value};

use crate::endpoints::Endpoints;
use crate::error::{AuthError, Result};
use crate::refresh::{refresh, RefreshKind};

const HOST_FIELD: &str = "alexaHostName";

/// Site URL for an `alexa.amazon.<domain>` host
pub fn site_from_host(host: &str) -> String {
    host.replacen("alexa", "https://www", 1)
}

/// Host named by the welcome response, defaulting to the current domain
pub fn welcome_host(welcome: &Map<String, Value>, domain: &str) -> String {
    welcome
        .get(HOST_FIELD)
        .and_then(Value::as_str)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("alexa.amazon.{}", domain))
}

/// Ask the service which regional site owns the account and move there.
///
/// On a domain change the session's cookie jar and CSRF token are replaced:
/// the old ones are dropped and a cookie exchange for the new domain fills
/// the jar and the bundle's website cookies. Returns the resolved site.
pub async fn resolve_domain(client: &HttpClient, endpoints: &Endpoints) -> Result<String> {
    let (domain, current_site) = {
        let session = client.session().read();
        (session.domain().to_string(), session.site_url())
    };

    let welcome = client.get_json(&endpoints.welcome(&domain)).await?;
    let site = site_from_host(&welcome_host(&welcome, &domain));
    if site == current_site {
        tracing::debug!("Account domain confirmed: {}", site);
        return Ok(site);
    }

    tracing::debug!("Account domain changed from {} to {}", current_site, site);
    let changed = client.session().write().apply_site(&site)?;
    if changed {
        let (refreshed, _) = refresh(client, endpoints, RefreshKind::AuthCookies).await?;
        if !refreshed {
            return Err(AuthError::CannotAuthenticate(format!(
                "Unable to obtain cookies for {}",
                site
            )));
        }
    }
    Ok(site)
}
