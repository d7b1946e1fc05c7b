// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form parsing for POST /process_image

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use tracing::debug;

use crate::api::errors::ApiError;
use crate::vision::Upload;

pub const IMAGE_FIELD: &str = "image";
pub const INSTRUCTIONS_FIELD: &str = "instructions";
pub const MODEL_FIELD: &str = "model_name";

/// Fields of one upload request
///
/// Only the first occurrence of each field counts. Unknown fields are skipped.
#[derive(Debug, Clone, Default)]
pub struct ProcessImageForm {
    pub upload: Option<Upload>,
    pub instructions: Option<String>,
    pub model_name: Option<String>,
}

impl ProcessImageForm {
    pub async fn from_multipart(
        mut multipart: Multipart,
        max_request_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, max_request_bytes))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                IMAGE_FIELD if form.upload.is_none() => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(e, max_request_bytes))?;
                    form.upload = Some(Upload {
                        filename,
                        content_type,
                        data,
                    });
                }
                INSTRUCTIONS_FIELD if form.instructions.is_none() => {
                    form.instructions = Some(
                        field
                            .text()
                            .await
                            .map_err(|e| multipart_error(e, max_request_bytes))?,
                    );
                }
                MODEL_FIELD if form.model_name.is_none() => {
                    form.model_name = Some(
                        field
                            .text()
                            .await
                            .map_err(|e| multipart_error(e, max_request_bytes))?,
                    );
                }
                _ => debug!("Ignoring multipart field '{}'", name),
            }
        }

        Ok(form)
    }
}

fn multipart_error(e: MultipartError, max_request_bytes: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge {
            limit: max_request_bytes,
        }
    } else {
        ApiError::InvalidRequest(format!("Malformed multipart body: {}", e.body_text()))
    }
}
