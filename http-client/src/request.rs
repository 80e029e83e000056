//! Request description handed to [`HttpClient::send`](crate::HttpClient::send)

use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Flat key/value map sent form-encoded
    Form(BTreeMap<String, String>),
    /// Arbitrary JSON document
    Json(Value),
}

/// User agent presented to the service
///
/// Some endpoints answer differently depending on which one they see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentProfile {
    /// The companion app's embedded web view
    #[default]
    App,
    /// A desktop browser
    Browser,
}

/// How a non-200 status is surfaced after retries are exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusHandling {
    /// Map the status onto an [`HttpError`](crate::HttpError)
    #[default]
    Strict,
    /// Return the response whatever its status, so the caller can read an
    /// embedded error body
    Passthrough,
}

/// One HTTP call
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub payload: Option<Payload>,
    pub profile: AgentProfile,
    pub headers: Vec<(String, String)>,
    pub status_handling: StatusHandling,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            payload: None,
            profile: AgentProfile::default(),
            headers: Vec::new(),
            status_handling: StatusHandling::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Form-encoded body
    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.payload = Some(Payload::Form(fields));
        self
    }

    /// JSON body
    pub fn json(mut self, body: Value) -> Self {
        self.payload = Some(Payload::Json(body));
        self
    }

    pub fn with_profile(mut self, profile: AgentProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Extra header, applied after the standard set
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn passthrough(mut self) -> Self {
        self.status_handling = StatusHandling::Passthrough;
        self
    }

    pub fn is_json(&self) -> bool {
        matches!(self.payload, Some(Payload::Json(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_builder() {
        let request = Request::post("https://api.amazon.com/auth/register")
            .json(json!({"a": 1}))
            .with_profile(AgentProfile::Browser)
            .with_header("x-test", "1")
            .passthrough();

        assert_eq!(request.method, Method::POST);
        assert!(request.is_json());
        assert_eq!(request.profile, AgentProfile::Browser);
        assert_eq!(request.headers, vec![("x-test".to_string(), "1".to_string())]);
        assert_eq!(request.status_handling, StatusHandling::Passthrough);
    }

    #[test]
    fn test_request_defaults() {
        let request = Request::get("https://www.amazon.com").form([("email", "a")]);
        assert_eq!(request.profile, AgentProfile::App);
        assert_eq!(request.status_handling, StatusHandling::Strict);
        assert!(!request.is_json());
    }
}
