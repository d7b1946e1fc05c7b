// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared helpers for driving the router in-process

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use futures::stream;
use ocr_relay::{
    api::{create_app, AppState},
    provider::ScriptedBackend,
    ProviderState, RelayConfig,
};
use std::{convert::Infallible, sync::Arc};
use tower::util::ServiceExt; // for `oneshot`

pub const BOUNDARY: &str = "relay-test-boundary";

// 1x1 red PNG - minimal valid image
pub const TINY_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mP8z8DwHwAFBQIAX8jx0gAAAABJRU5ErkJggg==";

// 1x1 GIF - valid image in a format that is not accepted
pub const TINY_GIF_BASE64: &str = "R0lGODlhAQABAIAAAP///wAAACH5BAEAAAAALAAAAAABAAEAAAICRAEAOw==";

pub fn tiny_png() -> Vec<u8> {
    STANDARD.decode(TINY_PNG_BASE64).unwrap()
}

pub fn tiny_gif() -> Vec<u8> {
    STANDARD.decode(TINY_GIF_BASE64).unwrap()
}

/// PNG signature followed by bytes that are not a valid PNG stream
pub fn corrupt_png() -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(b"definitely not an IHDR chunk");
    bytes
}

pub fn minimal_pdf() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n".to_vec()
}

/// One part of a multipart/form-data body
pub enum Part<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn image_part<'a>(filename: &'a str, data: &'a [u8]) -> Part<'a> {
    Part::File {
        name: "image",
        filename,
        content_type: "application/octet-stream",
        data,
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(parts: &[Part<'_>]) -> Request<Body> {
    let body = multipart_body(parts);
    Request::builder()
        .method("POST")
        .uri("/process_image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

/// Same body as [`upload_request`], sent in `chunk_size` pieces without a
/// `Content-Length` header
pub fn streamed_upload_request(parts: &[Part<'_>], chunk_size: usize) -> Request<Body> {
    let chunks: Vec<Result<Bytes, Infallible>> = multipart_body(parts)
        .chunks(chunk_size)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect();
    Request::builder()
        .method("POST")
        .uri("/process_image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from_stream(stream::iter(chunks)))
        .unwrap()
}

pub fn test_config() -> RelayConfig {
    RelayConfig {
        api_key: Some("test-key".to_string()),
        ..RelayConfig::default()
    }
}

/// Router backed by `backend`, with `config` tweaked by the caller
pub fn app_with(backend: &ScriptedBackend, config: RelayConfig) -> Router {
    let provider = ProviderState::ready(Arc::new(backend.clone()));
    create_app(AppState::new(config, provider))
}

pub fn scripted_app(backend: &ScriptedBackend) -> Router {
    app_with(backend, test_config())
}

pub fn unconfigured_app(config: RelayConfig) -> Router {
    let provider = ProviderState::Unconfigured {
        reason: "GOOGLE_API_KEY is not set".to_string(),
    };
    create_app(AppState::new(config, provider))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("body should be JSON")
    }

    pub fn error_message(&self) -> String {
        self.json()["error"]
            .as_str()
            .expect("error field should be a string")
            .to_string()
    }
}

pub async fn send(app: Router, request: Request<Body>) -> TestResponse {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
    }
}

pub async fn get(app: Router, uri: &str) -> TestResponse {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}
