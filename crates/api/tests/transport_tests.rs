use std::time::Duration;

use bindery_api::{ClientConfig, HttpTransport, Transport};
use bindery_types::{HttpMethod, OutboundRequest, TransportError};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(retries: u32) -> HttpTransport {
    let config = ClientConfig {
        retries,
        user_agent: "bindery-tests".to_string(),
        ..ClientConfig::default()
    };
    HttpTransport::new(&config).expect("build transport")
}

fn request(server: &MockServer, method: HttpMethod, route: &str) -> OutboundRequest {
    let url = Url::parse(&format!("{}{route}", server.uri())).expect("mock url");
    OutboundRequest::new(method, url)
}

#[tokio::test]
async fn get_sends_query_pairs_and_json_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/search"))
        .and(query_param("arg1", "a"))
        .and(query_param("arg2", "b"))
        .and(header("Accept", "application/json"))
        .and(header("Content-Type", "application/json"))
        .and(header("User-Agent", "bindery-tests"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok": true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let mut outbound = request(&server, HttpMethod::Get, "/v1/search");
    outbound.query = vec![("arg1".into(), "a".into()), ("arg2".into(), "b".into())];

    let response = transport(0).execute(&outbound).await.expect("request succeeds");
    assert_eq!(response.status, 200);
    assert_eq!(response.body, r#"{"ok": true}"#);
}

#[tokio::test]
async fn post_sends_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/auth/login"))
        .and(body_json(json!({"email": "a@b.c"})))
        .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"token": "t"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let mut outbound = request(&server, HttpMethod::Post, "/v1/auth/login");
    outbound.body = Some(json!({"email": "a@b.c"}));

    let response = transport(0).execute(&outbound).await.expect("request succeeds");
    assert_eq!(response.status, 201);
}

#[tokio::test]
async fn error_statuses_are_responses_not_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let response = transport(2)
        .execute(&request(&server, HttpMethod::Get, "/v1/version"))
        .await
        .expect("a 500 is still a response");
    assert_eq!(response.status, 500);
    assert_eq!(response.body, "boom");
}

#[tokio::test]
async fn timeouts_are_retried_then_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let transport = transport(1).with_timeout(Duration::from_millis(50));
    let error = transport
        .execute(&request(&server, HttpMethod::Get, "/v1/slow"))
        .await
        .expect_err("every attempt times out");
    assert!(matches!(error, TransportError::Timeout { timeout_ms: 50, .. }), "got {error:?}");
    assert!(error.is_retryable());
}

#[tokio::test]
async fn connection_failures_are_reported() {
    let outbound = OutboundRequest::new(
        HttpMethod::Get,
        Url::parse("http://127.0.0.1:1/v1/version").expect("url"),
    );
    let error = transport(0).execute(&outbound).await.expect_err("nothing listens on port 1");
    assert!(matches!(error, TransportError::Connect { .. }), "got {error:?}");
    assert_eq!(error.to_reply().status, 502);
}

#[tokio::test]
async fn https_requests_reach_the_tls_handshake() {
    // The mock listens on plain http, so the handshake itself fails.
    let server = MockServer::start().await;
    let url = Url::parse(&format!("https://{}/v1/version", server.address())).expect("https url");
    let error = transport(0)
        .execute(&OutboundRequest::new(HttpMethod::Get, url))
        .await
        .expect_err("no TLS on the other end");
    assert!(
        !error.to_string().contains("scheme is not http"),
        "https must be supported, got {error}"
    );
}

#[tokio::test]
async fn transport_errors_carry_their_causes() {
    let outbound = OutboundRequest::new(
        HttpMethod::Get,
        Url::parse("http://127.0.0.1:1/v1/version").expect("url"),
    );
    let TransportError::Connect { message, .. } = transport(0).execute(&outbound).await.expect_err("refused") else {
        panic!("expected a connect error");
    };
    assert!(message.matches(": ").count() >= 1, "cause chain missing in '{message}'");
}
