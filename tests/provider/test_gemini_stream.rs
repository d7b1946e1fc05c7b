// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Gemini client tests against a local mock of the REST API
//!
//! These tests verify that:
//! - The request targets the streaming endpoint with the key in a header
//! - The payload carries the system instruction, the instruction and the file
//! - SSE chunks become stream events in order
//! - HTTP failures surface as transport errors, not panics

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::StreamExt;
use ocr_relay::provider::{
    GeminiClient, GenerationBackend, GenerationRequest, GenerationSettings, GenerativeModel,
    ProviderError, StreamEvent, SYSTEM_INSTRUCTION,
};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.0-flash";
const STREAM_PATH: &str = "/v1beta/models/gemini-2.0-flash:streamGenerateContent";

fn sse_body(chunks: &[serde_json::Value]) -> String {
    chunks
        .iter()
        .map(|chunk| format!("data: {}\r\n\r\n", chunk))
        .collect()
}

fn text_chunk(text: &str) -> serde_json::Value {
    serde_json::json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
    })
}

fn client_for(server: &MockServer) -> GeminiClient {
    GeminiClient::new(Some("test-key"), &server.uri(), GenerationSettings::default()).unwrap()
}

fn png_request() -> GenerationRequest {
    GenerationRequest::for_document(
        Some("keep the table layout"),
        "image/png",
        Bytes::from_static(b"\x89PNG fake"),
    )
}

async fn run(client: &GeminiClient, request: GenerationRequest) -> Vec<StreamEvent> {
    let model = client.model(MODEL).unwrap();
    model.stream_generate(request).collect().await
}

#[tokio::test]
async fn test_streams_text_chunks_in_order() {
    let server = MockServer::start().await;
    let body = sse_body(&[
        text_chunk("--- Page 1 ---\n"),
        text_chunk("Hello "),
        serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "World"}]},
                "finishReason": "STOP"
            }]
        }),
    ]);

    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .and(query_param("alt", "sse"))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let events = run(&client_for(&server), png_request()).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Text("--- Page 1 ---\n".to_string()),
            StreamEvent::Text("Hello ".to_string()),
            StreamEvent::Text("World".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_request_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STREAM_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&[text_chunk("ok")]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    run(&client_for(&server), png_request()).await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].url.as_str().contains("test-key"));

    let payload: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(
        payload["systemInstruction"]["parts"][0]["text"],
        SYSTEM_INSTRUCTION
    );
    let parts = &payload["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Additional instruction: keep the table layout");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert_eq!(
        parts[1]["inlineData"]["data"],
        STANDARD.encode(b"\x89PNG fake")
    );
    assert!(payload["generationConfig"]["temperature"].is_number());
}

#[tokio::test]
async fn test_prompt_block_reported() {
    let server = MockServer::start().await;
    let body = sse_body(&[serde_json::json!({
        "promptFeedback": {"blockReason": "SAFETY"}
    })]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = run(&client_for(&server), png_request()).await;

    assert_eq!(events, vec![StreamEvent::Blocked("SAFETY".to_string())]);
}

#[tokio::test]
async fn test_abnormal_finish_reported_after_text() {
    let server = MockServer::start().await;
    let body = sse_body(&[serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "partial"}]},
            "finishReason": "MAX_TOKENS"
        }]
    })]);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let events = run(&client_for(&server), png_request()).await;

    assert_eq!(
        events,
        vec![
            StreamEvent::Text("partial".to_string()),
            StreamEvent::Stopped("MAX_TOKENS".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_http_error_becomes_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {"code": 404, "message": "models/gemini-2.0-flash is not found", "status": "NOT_FOUND"}
        })))
        .mount(&server)
        .await;

    let events = run(&client_for(&server), png_request()).await;

    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::TransportError(detail) => assert!(detail.contains("NOT_FOUND")),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let model = client.model(MODEL).unwrap();
    drop(model.stream_generate(png_request()));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[test]
fn test_invalid_model_id_rejected_locally() {
    let client = GeminiClient::new(
        Some("test-key"),
        "http://127.0.0.1:9",
        GenerationSettings::default(),
    )
    .unwrap();

    for bad in ["", "Gemini Pro", "../secrets", "model?x=1"] {
        assert!(
            matches!(client.model(bad), Err(ProviderError::InvalidModel(_))),
            "{:?} should be rejected",
            bad
        );
    }
}

#[test]
fn test_missing_key_rejected() {
    assert!(matches!(
        GeminiClient::new(None, "http://127.0.0.1:9", GenerationSettings::default()),
        Err(ProviderError::MissingApiKey)
    ));
    assert!(matches!(
        GeminiClient::new(Some("  "), "http://127.0.0.1:9", GenerationSettings::default()),
        Err(ProviderError::MissingApiKey)
    ));
}
