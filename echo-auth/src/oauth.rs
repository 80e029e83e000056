//! Authorization URL construction and authorization code extraction

use http_client::RawResponse;
use session_state::Region;
use url::Url;

use crate::error::{AuthError, Result};
use crate::pkce::PkceChallenge;

/// Query parameter carrying the authorization code on the return URL
pub const AUTHORIZATION_CODE_PARAM: &str = "openid.oa2.authorization_code";

const ASSOC_HANDLE: &str = "amzn_dp_project_dee_ios";
const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Sign-in URL for the mobile app's OpenID/OAuth2 flow
pub fn authorization_url(
    signin: &str,
    return_to: &str,
    region: &Region,
    client_id: &str,
    pkce: &PkceChallenge,
) -> Result<String> {
    let client_id = format!("device:{}", client_id);
    let language = region.oauth_language();
    let params = [
        ("openid.return_to", return_to),
        ("openid.oa2.code_challenge_method", "S256"),
        ("openid.assoc_handle", ASSOC_HANDLE),
        ("openid.identity", IDENTIFIER_SELECT),
        ("pageId", ASSOC_HANDLE),
        ("accountStatusPolicy", "P1"),
        ("openid.claimed_id", IDENTIFIER_SELECT),
        ("openid.mode", "checkid_setup"),
        ("openid.ns.oa2", "http://www.amazon.com/ap/ext/oauth/2"),
        ("openid.oa2.client_id", client_id.as_str()),
        ("language", language.as_str()),
        ("openid.ns.pape", "http://specs.openid.net/extensions/pape/1.0"),
        ("openid.oa2.code_challenge", pkce.challenge.as_str()),
        ("openid.oa2.scope", "device_auth_access"),
        ("openid.ns", "http://specs.openid.net/auth/2.0"),
        ("openid.pape.max_auth_age", "0"),
        ("openid.oa2.response_type", "code"),
    ];

    let url = Url::parse_with_params(signin, params)
        .map_err(|e| AuthError::CannotAuthenticate(format!("Invalid sign-in URL: {}", e)))?;
    Ok(url.into())
}

/// Authorization code from a URL's query string
pub fn code_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == AUTHORIZATION_CODE_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

/// Authorization code from the final response URL, else the first hop of
/// the redirect history that carries one
pub fn extract_authorization_code(response: &RawResponse) -> Result<String> {
    code_from_url(&response.url)
        .or_else(|| response.history.iter().find_map(code_from_url))
        .ok_or_else(|| {
            AuthError::CannotAuthenticate(format!(
                "Unable to extract authorization code from url: {}",
                response.url
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use std::collections::HashMap;

    fn response(url: &str, history: &[&str]) -> RawResponse {
        RawResponse {
            status: 200,
            url: Url::parse(url).unwrap(),
            history: history.iter().map(|u| Url::parse(u).unwrap()).collect(),
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_authorization_url_parameters() {
        let pkce = PkceChallenge::from_verifier("verifier".to_string());
        let region = Region::from_site("https://www.amazon.de").unwrap();
        let url = authorization_url(
            "https://www.amazon.com/ap/signin",
            "https://www.amazon.com/ap/maplanding",
            &region,
            "4142",
            &pkce,
        )
        .unwrap();

        let parsed = Url::parse(&url).unwrap();
        assert_eq!(parsed.path(), "/ap/signin");
        let params: HashMap<String, String> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["openid.oa2.client_id"], "device:4142");
        assert_eq!(params["openid.oa2.code_challenge"], pkce.challenge);
        assert_eq!(params["openid.oa2.code_challenge_method"], "S256");
        assert_eq!(params["openid.oa2.scope"], "device_auth_access");
        assert_eq!(params["openid.oa2.response_type"], "code");
        assert_eq!(params["openid.return_to"], "https://www.amazon.com/ap/maplanding");
        assert_eq!(params["language"], "de_DE");
        assert_eq!(params.len(), 17);
    }

    #[test]
    fn test_code_from_final_url() {
        let response = response(
            "https://www.amazon.com/ap/maplanding?openid.oa2.authorization_code=ANabc&x=1",
            &["https://www.amazon.com/ap/signin"],
        );
        assert_eq!(extract_authorization_code(&response).unwrap(), "ANabc");
    }

    #[test]
    fn test_code_from_history() {
        let response = response(
            "https://www.amazon.com/",
            &[
                "https://www.amazon.com/ap/signin",
                "https://www.amazon.com/ap/maplanding?openid.oa2.authorization_code=ANfirst",
                "https://www.amazon.com/ap/maplanding?openid.oa2.authorization_code=ANsecond",
            ],
        );
        assert_eq!(extract_authorization_code(&response).unwrap(), "ANfirst");
    }

    #[test]
    fn test_missing_code() {
        let response = response("https://www.amazon.com/ap/signin", &[]);
        assert!(matches!(
            extract_authorization_code(&response),
            Err(AuthError::CannotAuthenticate(_))
        ));
    }
}
