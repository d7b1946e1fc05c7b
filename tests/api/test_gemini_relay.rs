// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! End-to-end relay tests: router, real Gemini client, mocked Gemini API

use axum::http::StatusCode;
use ocr_relay::{
    api::{create_app, AppState},
    ProviderState, RelayConfig,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::support::*;

const DEFAULT_STREAM_PATH: &str = "/v1beta/models/gemini-2.5-pro-exp-03-25:streamGenerateContent";

fn gemini_app(server: &MockServer) -> axum::Router {
    let config = RelayConfig {
        api_base_url: server.uri(),
        ..test_config()
    };
    let provider = ProviderState::configure(&config);
    assert!(provider.is_configured());
    create_app(AppState::new(config, provider))
}

#[tokio::test]
async fn test_upload_relayed_to_gemini() {
    let server = MockServer::start().await;
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"--- Page 1 ---\\n\"}]}}]}\r\n\r\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hello World\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
    );
    Mock::given(method("POST"))
        .and(path(DEFAULT_STREAM_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    let png = tiny_png();
    let response = send(
        gemini_app(&server),
        upload_request(&[image_part("scan.png", &png)]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "--- Page 1 ---\nHello World");
}

#[tokio::test]
async fn test_upstream_failure_becomes_marker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let png = tiny_png();
    let response = send(
        gemini_app(&server),
        upload_request(&[image_part("scan.png", &png)]),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "<<ERROR: Server error during processing>>");
}

#[tokio::test]
async fn test_rejected_upload_never_reaches_gemini() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let gif = tiny_gif();
    let response = send(
        gemini_app(&server),
        upload_request(&[image_part("anim.gif", &gif)]),
    )
    .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(server.received_requests().await.unwrap().is_empty());
}
