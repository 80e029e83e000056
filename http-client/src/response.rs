//! Response types returned by the request wrapper

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{HttpError, Result};

/// Key under which a top-level JSON array is wrapped
pub const ARRAY_WRAPPER: &str = "generatedArrayWrapper";

/// Body interpreted opportunistically
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Empty,
    /// JSON document converted to a keyed map
    Json(Map<String, Value>),
    /// Anything else, typically HTML
    Markup(String),
}

impl ParsedBody {
    /// Classify a response body
    pub fn from_text(body: &str) -> Self {
        if body.trim().is_empty() {
            return ParsedBody::Empty;
        }
        match serde_json::from_str::<Value>(body) {
            Ok(value @ (Value::Object(_) | Value::Array(_) | Value::Null)) => {
                ParsedBody::Json(keyed_json(value).unwrap_or_default())
            }
            _ => ParsedBody::Markup(body.to_string()),
        }
    }

    pub fn as_json(&self) -> Option<&Map<String, Value>> {
        match self {
            ParsedBody::Json(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_markup(&self) -> Option<&str> {
        match self {
            ParsedBody::Markup(markup) => Some(markup),
            _ => None,
        }
    }
}

/// Final response of a request, after redirects and retries
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// URL of the final hop
    pub url: Url,
    /// URLs of every hop before the final one, in order
    pub history: Vec<Url>,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str()).unwrap_or_default()
    }

    /// Human reason phrase for the status
    pub fn reason(&self) -> String {
        status_phrase(self.status)
    }

    /// Body as a keyed JSON map.
    ///
    /// Arrays are wrapped under [`ARRAY_WRAPPER`]; `null` becomes an empty map.
    pub fn json(&self) -> Result<Map<String, Value>> {
        let value: Value = serde_json::from_str(&self.body).map_err(|e| {
            if self.body.trim().is_empty() {
                HttpError::CannotRetrieveData("Response not in JSON format".to_string())
            } else {
                HttpError::CannotRetrieveData(format!("Response with corrupted JSON format: {}", e))
            }
        })?;
        keyed_json(value)
    }
}

/// Convert a JSON value to the keyed form downstream code expects
pub fn keyed_json(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if map.is_empty() {
                tracing::warn!("Empty JSON data received");
            }
            Ok(map)
        }
        Value::Array(items) => {
            let mut map = Map::new();
            map.insert(ARRAY_WRAPPER.to_string(), Value::Array(items));
            Ok(map)
        }
        Value::Null => {
            tracing::warn!("Empty JSON data received");
            Ok(Map::new())
        }
        other => Err(HttpError::CannotRetrieveData(format!(
            "Unexpected JSON document: {}",
            other
        ))),
    }
}

/// Reason phrase for a status, including the non-standard warning codes
pub fn status_phrase(status: u16) -> String {
    match status {
        199 => "Miscellaneous Warning".to_string(),
        299 => "Miscellaneous Persistent Warning".to_string(),
        _ => StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown Status")
            .to_string(),
    }
}
