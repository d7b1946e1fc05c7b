// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Streaming plain-text response for POST /process_image

use std::convert::Infallible;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use bytes::Bytes;
use futures::stream::{Stream, StreamExt};

use crate::api::errors::ApiError;

pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wrap relayed chunks in a 200 chunked response
pub fn text_stream_response<S>(chunks: S, request_id: &str) -> Result<Response, ApiError>
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    let request_id = HeaderValue::from_str(request_id)
        .map_err(|e| ApiError::InternalError(format!("invalid request id: {}", e)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("x-accel-buffering", "no")
        .header(REQUEST_ID_HEADER, request_id)
        .body(Body::from_stream(chunks.map(Ok::<_, Infallible>)))
        .map_err(|e| ApiError::InternalError(format!("response build failed: {}", e)))
}
