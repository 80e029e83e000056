//! Region resolution from a site URL
//!
//! The service splits accounts across regional sites (`https://www.amazon.de`,
//! `https://www.amazon.co.uk`, ...). Everything region-dependent in a session
//! (cookie domain, `Accept-Language`, endpoint hosts) is derived from that one
//! site URL, so a domain swap only has to replace the [`Region`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, StateError};

/// Site used when no previous login selected a region
pub const DEFAULT_SITE: &str = "https://www.amazon.com";

const SITE_PREFIXES: [&str; 4] = [
    "https://www.amazon.",
    "http://www.amazon.",
    "www.amazon.",
    "amazon.",
];

/// Likely language for each country the service operates in.
///
/// Countries missing here fall back to `en-<COUNTRY>`.
const COUNTRY_LANGUAGES: &[(&str, &str)] = &[
    ("ae", "ar-AE"),
    ("at", "de-AT"),
    ("au", "en-AU"),
    ("be", "nl-BE"),
    ("br", "pt-BR"),
    ("ca", "en-CA"),
    ("ch", "de-CH"),
    ("de", "de-DE"),
    ("eg", "ar-EG"),
    ("es", "es-ES"),
    ("fr", "fr-FR"),
    ("ie", "en-IE"),
    ("in", "hi-IN"),
    ("it", "it-IT"),
    ("jp", "ja-JP"),
    ("mx", "es-MX"),
    ("nl", "nl-NL"),
    ("nz", "en-NZ"),
    ("pl", "pl-PL"),
    ("sa", "ar-SA"),
    ("se", "sv-SE"),
    ("sg", "en-SG"),
    ("tr", "tr-TR"),
    ("uk", "en-GB"),
    ("us", "en-US"),
    ("za", "en-ZA"),
];

/// Country, domain suffix and language resolved for one regional site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Lower-case country code (`us`, `uk`, `de`, ...)
    pub country: String,
    /// Domain suffix after `amazon.` (`com`, `co.uk`, `de`, ...)
    pub domain: String,
    /// BCP-47 language tag used for `Accept-Language`
    pub language: String,
}

impl Region {
    /// Derive the region from a site URL such as `https://www.amazon.co.uk`.
    ///
    /// A bare domain suffix (`co.uk`) is accepted as well.
    pub fn from_site(site: &str) -> Result<Self> {
        let lowered = site.trim().trim_end_matches('/').to_lowercase();
        let domain = SITE_PREFIXES
            .iter()
            .find_map(|prefix| lowered.strip_prefix(prefix))
            .unwrap_or(&lowered)
            .to_string();

        let valid = !domain.is_empty()
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains("..")
            && domain.chars().all(|c| c.is_ascii_lowercase() || c == '.');
        if !valid {
            return Err(StateError::InvalidSite(site.to_string()));
        }

        let country = if domain == "com" {
            "us".to_string()
        } else {
            domain.rsplit('.').next().unwrap_or(&domain).to_string()
        };
        let language = language_for_country(&country);

        tracing::debug!(
            "Initialize country <{}>: domain <amazon.{}>, language <{}>",
            country.to_uppercase(),
            domain,
            language
        );

        Ok(Self {
            country,
            domain,
            language,
        })
    }

    /// Canonical site URL for this region
    pub fn site_url(&self) -> String {
        format!("https://www.amazon.{}", self.domain)
    }

    /// Cookie domain the session cookies are scoped to
    pub fn cookie_domain(&self) -> String {
        format!("amazon.{}", self.domain)
    }

    /// Language tag with an underscore separator, as the sign-in page expects
    pub fn oauth_language(&self) -> String {
        self.language.replace('-', "_")
    }
}

impl Default for Region {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            domain: "com".to_string(),
            language: "en-US".to_string(),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "amazon.{} ({})", self.domain, self.language)
    }
}

/// Look up the language tag for a country code
pub fn language_for_country(country: &str) -> String {
    COUNTRY_LANGUAGES
        .iter()
        .find(|(code, _)| *code == country)
        .map(|(_, language)| language.to_string())
        .unwrap_or_else(|| format!("en-{}", country.to_uppercase()))
}
