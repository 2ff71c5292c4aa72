//! Integration tests for the Pub/Sub and Secret Manager clients against a mock server.

use bytes::Bytes;
use json2pubsub_lib::Host;
use json2pubsub_lib::publish::token::Credentials;
use json2pubsub_lib::publish::{Publisher, PubsubPublisher};
use json2pubsub_lib::secrets::{SecretManager, resolve};
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test host that captures output to in-memory buffers.
struct TestHost {
    output_buf: Vec<u8>,
    error_buf: Vec<u8>,
}

impl TestHost {
    const fn new() -> Self {
        Self {
            output_buf: Vec::new(),
            error_buf: Vec::new(),
        }
    }

    fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    fn error_str(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

impl Host for TestHost {
    fn output(&mut self) -> impl std::io::Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl std::io::Write {
        &mut self.error_buf
    }

    fn exit(&mut self, _code: i32) {}
}

fn static_token() -> Arc<Credentials> {
    Arc::new(Credentials::Static("tok".to_string()))
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_publish_sends_base64_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/projects/proj/topics/hooks:publish"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(serde_json::json!({ "messages": [{ "data": "eyJhIjoxfQ==" }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "messageIds": ["42"] })))
        .expect(1)
        .mount(&server)
        .await;

    let publisher = PubsubPublisher::new(reqwest::Client::new(), &server.uri(), Some("proj"), "hooks", static_token()).unwrap();
    assert_eq!(publisher.topic(), "projects/proj/topics/hooks");
    publisher.publish(Bytes::from_static(br#"{"a":1}"#)).await.unwrap();
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_publish_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("permission denied"))
        .mount(&server)
        .await;

    let publisher = PubsubPublisher::new(
        reqwest::Client::new(),
        &server.uri(),
        None,
        "projects/proj/topics/hooks",
        Arc::new(Credentials::Anonymous),
    )
    .unwrap();

    let err = publisher.publish(Bytes::from_static(b"{}")).await.unwrap_err();
    assert!(err.to_string().contains("403"), "{err}");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_secret_reference_is_resolved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/p/secrets/control/versions/latest:access"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "name": "projects/p/secrets/control/versions/1",
            "payload": { "data": "dHJ1ZQ==" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let manager = SecretManager::new(reqwest::Client::new(), &server.uri(), static_token());
    assert_eq!(resolve("gsm:projects/p/secrets/control", &manager).await.unwrap(), "true");
    assert_eq!(resolve("plain value", &manager).await.unwrap(), "plain value");
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_missing_secret_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let manager = SecretManager::new(reqwest::Client::new(), &server.uri(), static_token());
    let _ = resolve("gsm:projects/p/secrets/absent/versions/3", &manager).await.unwrap_err();
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_validate_command_resolves_secrets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/projects/p/secrets/control/versions/latest:access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "payload": { "data": "b3JpZ2luLmlwID09ICcxMjcuMC4wLjEn" }
        })))
        .mount(&server)
        .await;

    let endpoint = server.uri();
    let mut host = TestHost::new();
    json2pubsub_lib::run(
        &mut host,
        [
            "json2pubsub",
            "validate",
            "--access-token",
            "tok",
            "--secret-manager-endpoint",
            endpoint.as_str(),
            "--control-cel",
            "gsm:projects/p/secrets/control",
            "--message-cel",
            "request.json",
        ],
    )
    .await
    .unwrap();

    let output = host.output_str();
    assert!(output.contains("origin.ip == '127.0.0.1'"), "{output}");
    assert!(host.error_str().is_empty());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call CreateIoCompletionPort")]
async fn test_validate_command_reports_unreadable_secret() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let endpoint = server.uri();
    let mut host = TestHost::new();
    let result = json2pubsub_lib::run(
        &mut host,
        [
            "json2pubsub",
            "validate",
            "--access-token",
            "tok",
            "--secret-manager-endpoint",
            endpoint.as_str(),
            "--control-cel",
            "true",
            "--message-cel",
            "gsm:projects/p/secrets/message",
        ],
    )
    .await;

    let _ = result.unwrap_err();
    assert!(host.error_str().contains("validation failed"));
}
