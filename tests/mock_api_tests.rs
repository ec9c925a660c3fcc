//! Mock API tests for the speech synthesis client
//!
//! These tests run the client against a local mock server instead of the real endpoint.

use serde_json::json;
use shortreel::speech::{A4fClient, SpeechRequest, SpeechSynthesizer};
use shortreel::ShortreelError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> A4fClient {
    A4fClient::new("test-api-key".to_string()).with_base_url(format!("{}/v1", server.uri()))
}

fn hello_request() -> SpeechRequest {
    SpeechRequest::new("tts-1", "Hello there.", "alloy")
}

#[tokio::test]
async fn test_synthesize_returns_audio_bytes() {
    let server = MockServer::start().await;
    let audio = b"RIFF\x24\x00\x00\x00WAVEfmt fake audio".to_vec();

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(header("authorization", "Bearer test-api-key"))
        .and(body_json(json!({
            "model": "tts-1",
            "input": "Hello there.",
            "voice": "alloy"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let bytes = client_for(&server)
        .synthesize(&hello_request())
        .await
        .unwrap();

    assert_eq!(bytes, audio);
}

#[tokio::test]
async fn test_service_error_is_reported_once_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {
                "message": "voice model overloaded",
                "type": "server_error"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).synthesize(&hello_request()).await;

    match result {
        Err(ShortreelError::UpstreamService(msg)) => {
            assert!(msg.contains("voice model overloaded"), "{msg}");
            assert!(msg.contains("server_error"), "{msg}");
        }
        other => panic!("expected UpstreamService, got {other:?}"),
    }
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key\n"))
        .mount(&server)
        .await;

    let result = client_for(&server).synthesize(&hello_request()).await;

    match result {
        Err(ShortreelError::UpstreamService(msg)) => {
            assert!(msg.contains("401"), "{msg}");
            assert!(msg.contains("invalid api key"), "{msg}");
        }
        other => panic!("expected UpstreamService, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_body_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let result = client_for(&server).synthesize(&hello_request()).await;
    assert!(matches!(result, Err(ShortreelError::UpstreamService(_))));
}

#[tokio::test]
async fn test_connection_failure_is_upstream_error() {
    // Nothing listens on port 1
    let client =
        A4fClient::new("test-api-key".to_string()).with_base_url("http://127.0.0.1:1/v1");
    let result = client.synthesize(&hello_request()).await;

    assert!(matches!(result, Err(ShortreelError::UpstreamService(_))));
}
