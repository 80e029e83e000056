//! Request wrapper behavior against a mock server

use http_client::{
    AgentProfile, BackoffSchedule, HttpClient, HttpConfig, HttpError, ParsedBody, Request,
    ResponseRecorder, ARRAY_WRAPPER,
};
use mockito::{Matcher, Server};
use parking_lot::Mutex;
use rstest::rstest;
use serde_json::json;
use session_state::{SessionState, SharedSession};
use std::sync::Arc;
use std::time::Duration;

fn session() -> SharedSession {
    SessionState::new("user@example.com", "hunter2").shared()
}

fn client(session: SharedSession) -> HttpClient {
    let config = HttpConfig::default()
        .with_backoff(BackoffSchedule::new(vec![Duration::ZERO; 7]))
        .with_timeout(Duration::from_secs(5));
    HttpClient::new(session, config).unwrap()
}

#[rstest]
#[case(500)]
#[case(503)]
#[case(429)]
#[tokio::test]
async fn test_retryable_status_uses_every_attempt(#[case] status: usize) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/devices-v2/device")
        .with_status(status)
        .expect(7)
        .create_async()
        .await;

    let result = client(session())
        .send(Request::get(format!("{}/api/devices-v2/device", server.url())))
        .await;

    assert!(matches!(result, Err(HttpError::CannotRetrieveData(_))));
    mock.assert_async().await;
}

#[rstest]
#[case(400, "Request failed: Bad Request")]
#[case(404, "Request failed: Not Found")]
#[case(502, "Request failed: Bad Gateway")]
#[case(299, "Request failed: Miscellaneous Persistent Warning")]
#[tokio::test]
async fn test_other_status_fails_without_retry(#[case] status: usize, #[case] message: &str) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/welcome")
        .with_status(status)
        .expect(1)
        .create_async()
        .await;

    let result = client(session())
        .send(Request::get(format!("{}/api/welcome", server.url())))
        .await;

    match result {
        Err(HttpError::CannotRetrieveData(msg)) => assert_eq!(msg, message),
        other => panic!("Expected CannotRetrieveData, got {:?}", other),
    }
    mock.assert_async().await;
}

#[rstest]
#[case(401)]
#[case(403)]
#[case(407)]
#[tokio::test]
async fn test_auth_status_maps_to_cannot_authenticate(#[case] status: usize) {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/bootstrap")
        .with_status(status)
        .expect(1)
        .create_async()
        .await;

    let result = client(session())
        .send(Request::get(format!("{}/api/bootstrap", server.url())))
        .await;

    assert!(matches!(result, Err(HttpError::CannotAuthenticate(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_passthrough_returns_error_body() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("POST", "/auth/register")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"response":{"error":{"message":"invalid_grant"}}}"#)
        .create_async()
        .await;

    let (body, raw) = client(session())
        .send(
            Request::post(format!("{}/auth/register", server.url()))
                .json(json!({"auth_data": {}}))
                .passthrough(),
        )
        .await
        .unwrap();

    assert_eq!(raw.status, 400);
    assert_eq!(
        body.as_json().unwrap()["response"]["error"]["message"],
        "invalid_grant"
    );
}

#[tokio::test]
async fn test_signin_404_after_redirect_is_success() {
    let mut server = Server::new_async().await;
    let signin = server
        .mock("POST", "/ap/signin")
        .with_status(302)
        .with_header(
            "location",
            "/ap/maplanding?openid.oa2.authorization_code=ANcode",
        )
        .create_async()
        .await;
    let landing = server
        .mock("GET", "/ap/maplanding")
        .match_query(Matcher::Any)
        .with_status(404)
        .with_body("<html>not found</html>")
        .create_async()
        .await;

    let (body, raw) = client(session())
        .send(Request::post(format!("{}/ap/signin", server.url())).form([("email", "a")]))
        .await
        .unwrap();

    assert_eq!(raw.status, 404);
    assert_eq!(raw.history.len(), 1);
    assert_eq!(raw.history[0].path(), "/ap/signin");
    assert_eq!(raw.url.path(), "/ap/maplanding");
    assert!(raw
        .url
        .query_pairs()
        .any(|(k, v)| k == "openid.oa2.authorization_code" && v == "ANcode"));
    assert_eq!(body, ParsedBody::Markup("<html>not found</html>".to_string()));
    signin.assert_async().await;
    landing.assert_async().await;
}

#[tokio::test]
async fn test_redirect_cookies_and_csrf_adoption() {
    let mut server = Server::new_async().await;
    let _start = server
        .mock("GET", "/start")
        .with_status(302)
        .with_header("location", "/end")
        .with_header("set-cookie", "csrf=first; Path=/")
        .create_async()
        .await;
    let _end = server
        .mock("GET", "/end")
        .with_status(200)
        .with_header("set-cookie", "csrf=second; Path=/")
        .with_header("set-cookie", "session-id=42; Path=/")
        .with_body("ok")
        .create_async()
        .await;
    let follow_up = server
        .mock("GET", "/api/follow-up")
        .match_header("csrf", "first")
        .match_header("cookie", Matcher::Regex("session-id=42".to_string()))
        .with_status(200)
        .create_async()
        .await;

    let session = session();
    let client = client(session.clone());
    client
        .send(Request::get(format!("{}/start", server.url())))
        .await
        .unwrap();

    assert_eq!(session.read().csrf_token(), Some("first"));
    let cookies = client.cookies_for("127.0.0.1");
    assert_eq!(cookies.get("session-id").map(String::as_str), Some("42"));

    client
        .send(Request::get(format!("{}/api/follow-up", server.url())))
        .await
        .unwrap();
    follow_up.assert_async().await;
}

#[tokio::test]
async fn test_post_redirect_switches_to_get() {
    let mut server = Server::new_async().await;
    let submit = server
        .mock("POST", "/ap/signin")
        .with_status(302)
        .with_header("location", "/ap/cvf")
        .create_async()
        .await;
    let landing = server
        .mock("GET", "/ap/cvf")
        .with_status(200)
        .with_body("<html></html>")
        .create_async()
        .await;

    let (_, raw) = client(session())
        .send(Request::post(format!("{}/ap/signin", server.url())).form([("password", "pw")]))
        .await
        .unwrap();

    assert_eq!(raw.status, 200);
    submit.assert_async().await;
    landing.assert_async().await;
}

#[tokio::test]
async fn test_redirect_limit() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/loop")
        .with_status(302)
        .with_header("location", "/loop")
        .expect(4)
        .create_async()
        .await;

    let config = HttpConfig::default()
        .with_backoff(BackoffSchedule::none())
        .with_max_redirects(3);
    let client = HttpClient::new(session(), config).unwrap();
    let result = client
        .send(Request::get(format!("{}/loop", server.url())))
        .await;

    assert!(matches!(result, Err(HttpError::CannotRetrieveData(_))));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_json_array_is_wrapped() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/notifications")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"id": 1}, {"id": 2}]"#)
        .create_async()
        .await;

    let map = client(session())
        .get_json(&format!("{}/api/notifications", server.url()))
        .await
        .unwrap();

    assert_eq!(map[ARRAY_WRAPPER], json!([{"id": 1}, {"id": 2}]));
}

#[tokio::test]
async fn test_standard_headers_and_json_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/behaviors/preview")
        .match_header("user-agent", Matcher::Regex("^AmazonWebView/AmazonAlexa/".to_string()))
        .match_header("accept-language", "en-US")
        .match_header("accept-charset", "utf-8")
        .match_header("content-type", "application/json; charset=utf-8")
        .match_header("x-extra", "1")
        .match_body(Matcher::Json(json!({"behaviorId": "PREVIEW"})))
        .with_status(200)
        .create_async()
        .await;

    client(session())
        .send(
            Request::post(format!("{}/api/behaviors/preview", server.url()))
                .json(json!({"behaviorId": "PREVIEW"}))
                .with_header("x-extra", "1"),
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_browser_profile_and_form_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/auth/token")
        .match_header("user-agent", Matcher::Regex("^Mozilla/5.0".to_string()))
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("source_token".to_string(), "Atnr|x".to_string()),
            Matcher::UrlEncoded("requested_token_type".to_string(), "access_token".to_string()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    client(session())
        .send(
            Request::post(format!("{}/auth/token", server.url()))
                .form([
                    ("source_token", "Atnr|x"),
                    ("requested_token_type", "access_token"),
                ])
                .with_profile(AgentProfile::Browser),
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_connection_refused_is_cannot_connect() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = client(session())
        .send(Request::get(format!("http://127.0.0.1:{}/api/welcome", port)))
        .await;

    assert!(matches!(result, Err(HttpError::CannotConnect(_))));
}

#[derive(Default)]
struct CapturingRecorder {
    captured: Mutex<Vec<(String, String)>>,
}

impl ResponseRecorder for CapturingRecorder {
    fn record(&self, url: &str, _content_type: &str, body: &str) {
        self.captured.lock().push((url.to_string(), body.to_string()));
    }
}

#[tokio::test]
async fn test_recorder_receives_final_response() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/welcome")
        .with_status(200)
        .with_body(r#"{"alexaHostName": "alexa.amazon.com"}"#)
        .create_async()
        .await;

    let recorder = Arc::new(CapturingRecorder::default());
    let client = client(session()).with_recorder(recorder.clone());
    client
        .send(Request::get(format!("{}/api/welcome", server.url())))
        .await
        .unwrap();

    let captured = recorder.captured.lock();
    assert_eq!(captured.len(), 1);
    assert!(captured[0].0.ends_with("/api/welcome"));
    assert!(captured[0].1.contains("alexaHostName"));
}
