//! Debug capture of raw responses

/// Receives every final response body the wrapper hands back.
///
/// Applications install one to dump login pages and API payloads while
/// diagnosing protocol changes.
pub trait ResponseRecorder: Send + Sync {
    fn record(&self, url: &str, content_type: &str, body: &str);
}

impl<F> ResponseRecorder for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn record(&self, url: &str, content_type: &str, body: &str) {
        self(url, content_type, body)
    }
}
