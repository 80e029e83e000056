//! Resilient HTTP request wrapper for the cloud service
//!
//! Every network call of echo-sdk goes through [`HttpClient::send`]. The
//! wrapper injects the standard header set and the session cookies, follows
//! redirects by hand so the hop history and every hop's cookies are kept,
//! re-issues throttled requests on a fixed backoff schedule, and maps
//! failures onto [`HttpError`].

pub mod app;
pub mod config;
mod error;
pub mod recorder;
pub mod request;
pub mod response;
pub mod retry;

pub use app::{generate_frc, AppIdentity};
pub use config::HttpConfig;
pub use error::{HttpError, Result};
pub use recorder::ResponseRecorder;
pub use request::{AgentProfile, Payload, Request, StatusHandling};
pub use response::{keyed_json, status_phrase, ParsedBody, RawResponse, ARRAY_WRAPPER};
pub use retry::{is_retryable, run_with_backoff, BackoffSchedule, RETRYABLE_STATUSES};

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT_CHARSET, ACCEPT_ENCODING, ACCEPT_LANGUAGE,
    CONNECTION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE, USER_AGENT,
};
use reqwest::Method;
use serde_json::{Map, Value};
use session_state::{scrub_fields, SharedSession, SESSION_TOKEN_COOKIE};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Path of the sign-in endpoint
pub const URI_SIGNIN: &str = "/ap/signin";

/// Cookie and header carrying the anti-CSRF token
pub const CSRF_COOKIE: &str = "csrf";

/// Cookie telling the site which language to render
pub const LANGUAGE_COOKIE: &str = "lc-acbit";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// HTTP client bound to one [`SharedSession`]
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    session: SharedSession,
    config: HttpConfig,
    recorder: Option<Arc<dyn ResponseRecorder>>,
}

impl HttpClient {
    /// Create a client for a session
    pub fn new(session: SharedSession, config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout)
            .gzip(true)
            .build()
            .map_err(|e| HttpError::CannotConnect(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            session,
            config,
            recorder: None,
        })
    }

    /// Install a recorder receiving every final response
    pub fn with_recorder(mut self, recorder: Arc<dyn ResponseRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Send one request.
    ///
    /// Statuses 500, 503 and 429 are re-issued following the backoff
    /// schedule. Transport failures surface immediately as
    /// [`HttpError::CannotConnect`]. With [`StatusHandling::Strict`] the
    /// final status is mapped: 200 passes, 401/403/407 become
    /// [`HttpError::CannotAuthenticate`], anything else becomes
    /// [`HttpError::CannotRetrieveData`] except a 404 reached through a
    /// redirect chain that started at the sign-in page.
    pub async fn send(&self, request: Request) -> Result<(ParsedBody, RawResponse)> {
        tracing::debug!(
            "{} request: {} with payload {} [json={}]",
            request.method,
            request.url,
            describe_payload(request.payload.as_ref()),
            request.is_json()
        );

        self.seed_cookies();

        let last = run_with_backoff(
            &self.config.backoff,
            &request.url,
            |response: &RawResponse| is_retryable(response.status),
            || self.execute(&request),
        )
        .await?;

        let response = last.ok_or_else(|| {
            tracing::error!("No response received from {}", request.url);
            HttpError::CannotConnect(format!("No response received from {}", request.url))
        })?;

        tracing::debug!(
            "Response for url {}: status {}, content type {}",
            response.url,
            response.status,
            response.content_type()
        );

        if request.status_handling == StatusHandling::Strict {
            check_status(&response)?;
        }

        if let Some(recorder) = &self.recorder {
            recorder.record(response.url.as_str(), response.content_type(), &response.body);
        }

        Ok((ParsedBody::from_text(&response.body), response))
    }

    /// GET a URL and return its body as keyed JSON
    pub async fn get_json(&self, url: &str) -> Result<Map<String, Value>> {
        let (_, response) = self.send(Request::get(url)).await?;
        response.json()
    }

    /// Drop the cookie jar and the CSRF token
    pub fn clear_cookies(&self) {
        self.session.write().clear_cookies();
    }

    /// Store cookies for a cookie domain
    pub fn set_cookies(&self, domain: &str, cookies: BTreeMap<String, String>) {
        self.session.write().cookies_mut().extend(domain, cookies);
    }

    /// Cookies that would be sent to a host
    pub fn cookies_for(&self, host: &str) -> BTreeMap<String, String> {
        self.session.read().cookies().for_host(host)
    }

    /// One attempt, following redirects manually
    async fn execute(&self, request: &Request) -> Result<RawResponse> {
        let mut url = Url::parse(&request.url).map_err(|e| {
            HttpError::CannotRetrieveData(format!("Invalid URL {}: {}", request.url, e))
        })?;
        let mut method = request.method.clone();
        let mut payload = request.payload.as_ref();
        let mut history = Vec::new();

        loop {
            let builder = self.prepare(&method, &url, payload, request)?;
            let response = builder.send().await.map_err(|e| {
                tracing::warn!("Connection error to {}: {}", url, e);
                HttpError::from_transport(method.as_str(), &e)
            })?;

            let status = response.status().as_u16();
            self.absorb_cookies(&url, response.headers());

            if response.status().is_redirection() {
                if let Some(location) = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                {
                    if history.len() >= self.config.max_redirects {
                        return Err(HttpError::CannotRetrieveData(format!(
                            "Too many redirects from {}",
                            request.url
                        )));
                    }
                    let next = url.join(location).map_err(|e| {
                        HttpError::CannotRetrieveData(format!(
                            "Invalid redirect location {}: {}",
                            location, e
                        ))
                    })?;
                    tracing::debug!("Following {} redirect to {}", status, next);

                    if matches!(status, 301..=303) && method != Method::HEAD {
                        method = Method::GET;
                        payload = None;
                    }
                    history.push(std::mem::replace(&mut url, next));
                    continue;
                }
            }

            let headers = response.headers().clone();
            let body = response.text().await.map_err(|e| {
                tracing::warn!("Connection error reading {}: {}", url, e);
                HttpError::from_transport(method.as_str(), &e)
            })?;

            return Ok(RawResponse {
                status,
                url,
                history,
                headers,
                body,
            });
        }
    }

    /// Build one hop. The session lock is released before returning.
    fn prepare(
        &self,
        method: &Method,
        url: &Url,
        payload: Option<&Payload>,
        request: &Request,
    ) -> Result<reqwest::RequestBuilder> {
        let (language, csrf, cookie_header) = {
            let session = self.session.read();
            let host = url.host_str().unwrap_or_default();
            (
                session.language().to_string(),
                session.csrf_token().map(str::to_string),
                session.cookies().header_for(host),
            )
        };

        let user_agent = match request.profile {
            AgentProfile::App => self.config.app.app_user_agent(),
            AgentProfile::Browser => self.config.app.browser_user_agent().to_string(),
        };

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_CHARSET, HeaderValue::from_static("utf-8"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(USER_AGENT, header_value(&user_agent)?);
        headers.insert(ACCEPT_LANGUAGE, header_value(&language)?);
        if let Some(csrf) = csrf {
            headers.insert(HeaderName::from_static(CSRF_COOKIE), header_value(&csrf)?);
        }
        if let Some(cookies) = cookie_header {
            headers.insert(COOKIE, header_value(&cookies)?);
        }

        let mut builder = self.client.request(method.clone(), url.clone());
        match payload {
            Some(Payload::Form(fields)) => builder = builder.form(fields),
            Some(Payload::Json(body)) => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                builder = builder.body(body.to_string());
            }
            None => {}
        }

        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                HttpError::CannotRetrieveData(format!("Invalid header name: {}", name))
            })?;
            headers.insert(name, header_value(value)?);
        }

        Ok(builder.headers(headers))
    }

    /// Put the session's base cookies in the jar for the active domain
    fn seed_cookies(&self) {
        let mut session = self.session.write();
        let domain = session.region().cookie_domain();
        let language = session.language().to_string();

        let website_seeds = session.credentials().map(|credentials| {
            let mut seeds: Vec<(String, String)> = credentials
                .website_cookies
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            seeds.push((
                SESSION_TOKEN_COOKIE.to_string(),
                credentials.store_authentication_cookie.cookie.clone(),
            ));
            seeds.push((LANGUAGE_COOKIE.to_string(), language));
            seeds
        });
        let seeds = match website_seeds {
            Some(seeds) => seeds,
            None => {
                let frc = session.frc_or_init(generate_frc);
                self.config.app.bootstrap_cookies(&frc)
            }
        };

        session.cookies_mut().extend(&domain, seeds);
    }

    /// Fold a hop's `Set-Cookie` headers into the jar and adopt a CSRF token
    fn absorb_cookies(&self, url: &Url, headers: &HeaderMap) {
        let host = url.host_str().unwrap_or_default();
        let mut session = self.session.write();
        for value in headers.get_all(SET_COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            let Some(cookie) = session.cookies_mut().store_set_cookie(value, host) else {
                continue;
            };
            if cookie.name == CSRF_COOKIE && !cookie.expired && session.adopt_csrf(&cookie.value) {
                tracing::debug!("CSRF cookie adopted [{}]", url);
            }
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("recorder", &self.recorder.is_some())
            .finish()
    }
}

/// Map a final status onto the error taxonomy
fn check_status(response: &RawResponse) -> Result<()> {
    match response.status {
        200 => Ok(()),
        401 | 403 | 407 => Err(HttpError::CannotAuthenticate(response.reason())),
        404 if is_signin_not_found(response) => {
            tracing::debug!("Ignoring 404 from sign-in redirect chain");
            Ok(())
        }
        _ => {
            tracing::debug!("Error response content: {}", response.body);
            Err(HttpError::CannotRetrieveData(format!(
                "Request failed: {}",
                response.reason()
            )))
        }
    }
}

/// The sign-in endpoint answers 404 at the end of its redirect chain while
/// still carrying what the caller needs
fn is_signin_not_found(response: &RawResponse) -> bool {
    response.status == 404
        && response
            .history
            .first()
            .is_some_and(|first| first.path().contains(URI_SIGNIN))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| HttpError::CannotRetrieveData("Invalid header value".to_string()))
}

fn describe_payload(payload: Option<&Payload>) -> String {
    match payload {
        None => "None".to_string(),
        Some(Payload::Json(body)) => scrub_fields(body).to_string(),
        Some(Payload::Form(fields)) => {
            let value = Value::Object(
                fields
                    .iter()
                    .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                    .collect(),
            );
            scrub_fields(&value).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use session_state::SessionState;

    fn raw(status: u16, history: &[&str]) -> RawResponse {
        RawResponse {
            status,
            url: Url::parse("https://www.amazon.com/ap/maplanding").unwrap(),
            history: history.iter().map(|u| Url::parse(u).unwrap()).collect(),
            headers: HeaderMap::new(),
            body: String::new(),
        }
    }

    #[test]
    fn test_signin_404_allowance() {
        assert!(check_status(&raw(404, &["https://www.amazon.com/ap/signin?x=1"])).is_ok());
        assert!(matches!(
            check_status(&raw(404, &[])),
            Err(HttpError::CannotRetrieveData(_))
        ));
        assert!(matches!(
            check_status(&raw(404, &["https://www.amazon.com/other", "https://www.amazon.com/ap/signin"])),
            Err(HttpError::CannotRetrieveData(_))
        ));
    }

    #[test]
    fn test_auth_statuses() {
        for status in [401, 403, 407] {
            assert!(matches!(
                check_status(&raw(status, &[])),
                Err(HttpError::CannotAuthenticate(_))
            ));
        }
        match check_status(&raw(502, &[])) {
            Err(HttpError::CannotRetrieveData(msg)) => assert_eq!(msg, "Request failed: Bad Gateway"),
            other => panic!("Expected CannotRetrieveData, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_description_is_scrubbed() {
        let mut fields = BTreeMap::new();
        fields.insert("email".to_string(), "user@example.com".to_string());
        fields.insert("password".to_string(), "hunter2".to_string());
        let description = describe_payload(Some(&Payload::Form(fields)));
        assert!(!description.contains("hunter2"));
        assert!(!description.contains("user@example.com"));
    }

    #[test]
    fn test_payload_description_hides_tokens() {
        let mut fields = BTreeMap::new();
        fields.insert("source_token".to_string(), "Atnr|refresh".to_string());
        fields.insert("otpCode".to_string(), "123456".to_string());
        fields.insert("domain".to_string(), "www.amazon.com".to_string());
        let description = describe_payload(Some(&Payload::Form(fields)));
        assert!(!description.contains("Atnr|refresh"));
        assert!(!description.contains("123456"));
        assert!(description.contains("www.amazon.com"));

        let body = serde_json::json!({"auth_data": {
            "authorization_code": "ANcode",
            "code_verifier": "verifier-value"
        }});
        let description = describe_payload(Some(&Payload::Json(body)));
        assert!(!description.contains("ANcode"));
        assert!(!description.contains("verifier-value"));
    }

    #[test]
    fn test_seed_bootstrap_cookies_without_credentials() {
        let session = SessionState::new("user@example.com", "pw").shared();
        let client = HttpClient::new(session.clone(), HttpConfig::default()).unwrap();
        client.seed_cookies();
        client.seed_cookies();

        let cookies = client.cookies_for("www.amazon.com");
        assert_eq!(
            cookies.get("amzn-app-id").map(String::as_str),
            Some("MAPiOSLib/6.0/ToHideRetailLink")
        );
        assert!(cookies.contains_key("frc"));
        assert!(cookies.contains_key("map-md"));
        assert_eq!(session.read().cookies().len(), 3);
    }

    #[test]
    fn test_clear_cookies_drops_csrf() {
        let session = SessionState::new("user@example.com", "pw").shared();
        let client = HttpClient::new(session.clone(), HttpConfig::default()).unwrap();
        session.write().adopt_csrf("token");
        let mut cookies = BTreeMap::new();
        cookies.insert("a".to_string(), "1".to_string());
        client.set_cookies(".amazon.de", cookies);
        assert_eq!(client.cookies_for("alexa.amazon.de").len(), 1);

        client.clear_cookies();
        assert!(client.cookies_for("alexa.amazon.de").is_empty());
        assert!(session.read().csrf_token().is_none());
    }
}
