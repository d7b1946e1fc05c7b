// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload endpoint handler

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::Response,
};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::{debug, info};
use uuid::Uuid;

use super::request::ProcessImageForm;
use super::response::text_stream_response;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::api::streaming::relay_stream;
use crate::provider::GenerationRequest;
use crate::vision::{validate_upload, UploadLimits};

/// POST /process_image - Stream the text extracted from an image or PDF
///
/// # Request
/// multipart/form-data with
/// - `image`: the file (png, jpg, jpeg, webp or pdf; required)
/// - `instructions`: extra guidance for the model (optional)
/// - `model_name`: one of the allowed models (optional)
///
/// # Response
/// 200 `text/plain; charset=utf-8`, streamed as the model produces it. Failures
/// after the stream started are appended as `<<ERROR: ...>>`.
///
/// # Errors
/// - 400 Bad Request: missing or invalid upload, disallowed model, oversized body
/// - 500 Internal Server Error: provider not configured, model unavailable
pub async fn process_image_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    // 1. Startup gate
    let backend = state.provider.backend()?.clone();

    // 2. Reject declared oversize bodies before reading them
    let max_request_bytes = state.config.max_request_bytes;
    if let Some(length) = content_length(&headers) {
        if length > max_request_bytes as u64 {
            return Err(ApiError::PayloadTooLarge {
                limit: max_request_bytes,
            });
        }
    }

    // 3. Read the form
    let multipart = multipart.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let form = ProcessImageForm::from_multipart(multipart, max_request_bytes).await?;

    // 4. Validate the upload
    let limits = UploadLimits {
        max_bytes: state.config.max_upload_bytes,
    };
    let upload = validate_upload(form.upload, limits).await?;

    // 5. Resolve the model
    let model_id = state.selector.select(form.model_name.as_deref())?;
    let model = backend.model(&model_id)?;

    // 6. Open the upstream stream and relay it
    let request_id = Uuid::new_v4().to_string();
    info!(
        "[{}] Streaming {} ({} bytes, declared {}) through {}",
        request_id,
        upload.mime_type,
        upload.data.len(),
        upload.declared_type.as_deref().unwrap_or("none"),
        model.model_id()
    );

    let request =
        GenerationRequest::for_document(form.instructions.as_deref(), &upload.mime_type, upload.data);
    if let Some(instruction) = request.instruction() {
        debug!("[{}] {}", request_id, instruction);
    }

    let events = model.stream_generate(request);
    let chunks = relay_stream(events, state.config.idle_timeout(), request_id.clone());

    text_stream_response(chunks, &request_id)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
