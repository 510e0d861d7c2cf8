#![allow(clippy::unwrap_used)]
// Integration tests for `LapClient` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lapbridge_api::{BearerToken, Endpoints, Error, LapClient, TagEventBody, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, LapClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let token = BearerToken::new(SecretString::from("test-token".to_string()));
    let client = LapClient::new(
        &base_url,
        &token,
        &Endpoints::default(),
        &TransportConfig::default(),
    )
    .unwrap();
    (server, client)
}

// ── Lap events ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_tag_event_posts_json_with_bearer() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/tag"))
        .and(header("authorization", "Bearer test-token"))
        .and(body_json(json!({ "identifier": "E2801160", "elapsedMs": 35000 })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let status = client
        .send_tag_event(&TagEventBody::new("E2801160", 35_000))
        .await
        .unwrap();

    assert_eq!(status.as_u16(), 201);
}

#[tokio::test]
async fn test_send_tag_event_server_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/tag"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&server)
        .await;

    let result = client
        .send_tag_event(&TagEventBody::new("E2801160", 31_000))
        .await;

    match result {
        Err(Error::Status { status, ref body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("database"), "unexpected body: {body}");
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_send_tag_event_unauthorized() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/tag"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client
        .send_tag_event(&TagEventBody::new("E2801160", 31_000))
        .await;

    assert!(
        matches!(result, Err(Error::Unauthorized { status: 401 })),
        "expected Unauthorized error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_send_tag_event_timeout() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let token = BearerToken::new(SecretString::from("test-token".to_string()));
    let transport = TransportConfig {
        timeout: Duration::from_millis(100),
        ..TransportConfig::default()
    };
    let client = LapClient::new(&base_url, &token, &Endpoints::default(), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/v1/tag"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = client
        .send_tag_event(&TagEventBody::new("E2801160", 31_000))
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got: {err:?}");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    // Bind-then-drop leaves a port nothing is listening on.
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let base_url = Url::parse(&format!("http://{addr}")).unwrap();
    let token = BearerToken::new(SecretString::from("test-token".to_string()));
    let client = LapClient::new(
        &base_url,
        &token,
        &Endpoints::default(),
        &TransportConfig::default(),
    )
    .unwrap();

    let err = client.ping().await.unwrap_err();
    assert!(err.is_transport(), "expected transport error, got: {err:?}");
    assert_eq!(err.status(), None);
}

// ── Ping ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_ping_posts_empty_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/ping"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let status = client.ping().await.unwrap();
    assert_eq!(status.as_u16(), 204);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn test_custom_endpoints() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/race", server.uri())).unwrap();
    let token = BearerToken::new(SecretString::from("t".to_string()));
    let endpoints = Endpoints {
        lap_path: "laps".into(),
        ping_path: "/health/ping".into(),
    };
    let client =
        LapClient::new(&base_url, &token, &endpoints, &TransportConfig::default()).unwrap();

    Mock::given(method("POST"))
        .and(path("/race/health/ping"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(client.lap_url().path(), "/race/laps");
    client.ping().await.unwrap();
}
