//! Domain-scoped cookie storage
//!
//! Cookies are kept per cookie domain so a regional domain swap can drop the
//! whole set at once. Request hosts are matched by domain suffix, the way
//! browsers match a `Domain=.amazon.de` attribute.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;

/// Non-RFC 2822 `Expires` layouts still sent by some servers, without the zone
const LEGACY_DATE_FORMATS: [&str; 2] = ["%a, %d-%b-%Y %H:%M:%S", "%a, %d-%b-%y %H:%M:%S"];

/// A cookie parsed from a `Set-Cookie` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    /// Normalized domain the cookie applies to
    pub domain: String,
    /// Cookie name
    pub name: String,
    /// Cookie value with surrounding quotes removed
    pub value: String,
    /// True when the server asked for the cookie to be deleted
    pub expired: bool,
}

/// Cookie values grouped by cookie domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    domains: BTreeMap<String, BTreeMap<String, String>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one cookie for a domain, replacing any previous value
    pub fn insert(&mut self, domain: &str, name: impl Into<String>, value: impl Into<String>) {
        self.domains
            .entry(normalize_domain(domain))
            .or_default()
            .insert(name.into(), value.into());
    }

    /// Store several cookies for the same domain
    pub fn extend<I, K, V>(&mut self, domain: &str, cookies: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entry = self.domains.entry(normalize_domain(domain)).or_default();
        for (name, value) in cookies {
            entry.insert(name.into(), value.into());
        }
    }

    /// Remove a cookie from a domain
    pub fn remove(&mut self, domain: &str, name: &str) -> Option<String> {
        let domain = normalize_domain(domain);
        let removed = self.domains.get_mut(&domain)?.remove(name);
        if self.domains.get(&domain).is_some_and(|c| c.is_empty()) {
            self.domains.remove(&domain);
        }
        removed
    }

    /// Value of a cookie stored for exactly this domain
    pub fn get(&self, domain: &str, name: &str) -> Option<&str> {
        self.domains
            .get(&normalize_domain(domain))?
            .get(name)
            .map(String::as_str)
    }

    /// Value of a cookie stored under any domain
    pub fn find(&self, name: &str) -> Option<&str> {
        self.domains
            .values()
            .find_map(|cookies| cookies.get(name))
            .map(String::as_str)
    }

    /// All cookies that apply to a request host.
    ///
    /// When two matching domains carry the same name, the more specific
    /// (longer) domain wins.
    pub fn for_host(&self, host: &str) -> BTreeMap<String, String> {
        let host = host.to_ascii_lowercase();
        let mut matching: Vec<(&String, &BTreeMap<String, String>)> = self
            .domains
            .iter()
            .filter(|(domain, _)| domain_matches(&host, domain))
            .collect();
        matching.sort_by_key(|(domain, _)| domain.len());

        let mut merged = BTreeMap::new();
        for (_, cookies) in matching {
            for (name, value) in cookies {
                merged.insert(name.clone(), value.clone());
            }
        }
        merged
    }

    /// `Cookie` header value for a request host, if any cookie applies
    pub fn header_for(&self, host: &str) -> Option<String> {
        let cookies = self.for_host(host);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Fold one `Set-Cookie` header received from `request_host` into the jar
    pub fn store_set_cookie(&mut self, header: &str, request_host: &str) -> Option<SetCookie> {
        let cookie = parse_set_cookie(header, request_host)?;
        if cookie.expired {
            self.remove(&cookie.domain, &cookie.name);
        } else {
            self.insert(&cookie.domain, cookie.name.clone(), cookie.value.clone());
        }
        Some(cookie)
    }

    /// Domains currently holding cookies
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.keys().map(String::as_str)
    }

    /// Drop every cookie
    pub fn clear(&mut self) {
        self.domains.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.domains.values().all(|cookies| cookies.is_empty())
    }

    /// Total number of stored cookies across all domains
    pub fn len(&self) -> usize {
        self.domains.values().map(BTreeMap::len).sum()
    }
}

/// Parse a `Set-Cookie` header value.
///
/// The cookie domain comes from the `Domain` attribute, or the request host
/// when the attribute is absent. `Max-Age<=0` or an `Expires` date in the past
/// marks the cookie as expired; `Max-Age` wins when both are present.
pub fn parse_set_cookie(header: &str, request_host: &str) -> Option<SetCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut domain = request_host.to_string();
    let mut max_age = None;
    let mut expires = None;
    for attribute in parts {
        let (key, attr_value) = match attribute.split_once('=') {
            Some((key, attr_value)) => (key.trim(), attr_value.trim()),
            None => (attribute.trim(), ""),
        };
        if key.eq_ignore_ascii_case("domain") && !attr_value.is_empty() {
            domain = attr_value.to_string();
        } else if key.eq_ignore_ascii_case("max-age") {
            max_age = attr_value.parse::<i64>().ok();
        } else if key.eq_ignore_ascii_case("expires") {
            expires = parse_cookie_date(attr_value);
        }
    }

    let expired = match (max_age, expires) {
        (Some(age), _) => age <= 0,
        (None, Some(expires_at)) => expires_at <= Utc::now(),
        (None, None) => false,
    };

    Some(SetCookie {
        domain: normalize_domain(&domain),
        name: name.to_string(),
        value: strip_quotes(value.trim()),
        expired,
    })
}

/// Cookie values are sometimes delivered wrapped in double quotes
pub fn strip_quotes(value: &str) -> String {
    value.replace('"', "")
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc2822(value) {
        return Some(date.with_timezone(&Utc));
    }
    let value = value.trim_end_matches("GMT").trim();
    LEGACY_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|date| date.and_utc())
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
