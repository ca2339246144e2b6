//! Session backend contract tests against a mock interview service.

use proctor::ProctorError;
use proctor::backend::{HttpSessionBackend, SessionAck, SessionBackend};
use proctor::config::BackendConfig;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer) -> HttpSessionBackend {
    HttpSessionBackend::new(BackendConfig {
        base_url: server.uri(),
        api_prefix: "/api".into(),
        request_timeout_secs: 5,
    })
}

#[tokio::test]
async fn start_and_end_post_to_session_routes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/s1/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "in_progress"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/interview/s1/end"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server);
    let started = backend.start_session("s1").await;
    assert_eq!(
        started.ok(),
        Some(SessionAck {
            status: "in_progress".into()
        })
    );
    let ended = backend.end_session("s1").await;
    assert_eq!(ended.ok().map(|ack| ack.status), Some("completed".into()));
}

#[tokio::test]
async fn empty_success_body_is_a_default_ack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/s2/end"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let ack = backend_for(&server).end_session("s2").await;
    assert_eq!(ack.ok(), Some(SessionAck::default()));
}

#[tokio::test]
async fn error_status_maps_to_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/interview/missing/start"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Interview not found"))
        .mount(&server)
        .await;

    match backend_for(&server).start_session("missing").await {
        Err(ProctorError::Backend(msg)) => {
            assert!(msg.contains("404"), "unexpected message: {msg}");
            assert!(msg.contains("Interview not found"), "unexpected message: {msg}");
        }
        other => panic!("expected backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_service_is_a_backend_error() {
    let backend = HttpSessionBackend::new(BackendConfig {
        base_url: "http://127.0.0.1:9".into(),
        api_prefix: "/api".into(),
        request_timeout_secs: 2,
    });
    assert!(matches!(
        backend.start_session("s1").await,
        Err(ProctorError::Backend(_))
    ));
}
