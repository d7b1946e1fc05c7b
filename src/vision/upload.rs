// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload validation performed before anything is sent to the provider

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use super::image_utils::{verify_image_bytes, ImageError, ImageInfo};

/// File extensions accepted on upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "pdf"];

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No 'image' part in the request")]
    MissingFile,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type '{0}'. Allowed: {}", ALLOWED_EXTENSIONS.join(", "))]
    DisallowedExtension(String),

    #[error("File is {size} bytes, exceeding the maximum of {max} bytes")]
    TooLarge { size: usize, max: usize },

    #[error("Uploaded file is empty")]
    EmptyFile,

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Image verification did not complete: {0}")]
    Verification(String),
}

/// A file part as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// An upload that passed every check and may be forwarded
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub extension: String,
    pub mime_type: String,
    /// Content type the client sent, kept for logging only
    pub declared_type: Option<String>,
    pub data: Bytes,
    /// Present for images, `None` for PDFs
    pub image: Option<ImageInfo>,
}

#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    pub max_bytes: usize,
}

/// Lower-cased text after the last `.`, if any
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Checks that need no decoding: presence, name, extension and size
///
/// Returns the normalised extension.
pub fn check_upload(upload: &Upload, limits: UploadLimits) -> Result<String, UploadError> {
    if upload.filename.is_empty() {
        return Err(UploadError::EmptyFilename);
    }

    let extension = file_extension(&upload.filename).unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::DisallowedExtension(extension));
    }

    if upload.data.len() > limits.max_bytes {
        return Err(UploadError::TooLarge {
            size: upload.data.len(),
            max: limits.max_bytes,
        });
    }

    if upload.data.is_empty() {
        return Err(UploadError::EmptyFile);
    }

    Ok(extension)
}

/// Full upload validation, including image decoding for non-PDF files
///
/// Image uploads are sent with the MIME type of the decoded container, so a
/// mislabelled `.jpg` that is really a PNG still reaches the provider with
/// `image/png`. PDFs are forwarded as `application/pdf` without inspection.
pub async fn validate_upload(
    upload: Option<Upload>,
    limits: UploadLimits,
) -> Result<ValidatedUpload, UploadError> {
    let upload = upload.ok_or(UploadError::MissingFile)?;
    let extension = check_upload(&upload, limits)?;

    if extension == "pdf" {
        return Ok(ValidatedUpload {
            extension,
            mime_type: PDF_MIME.to_string(),
            declared_type: upload.content_type,
            data: upload.data,
            image: None,
        });
    }

    let data = upload.data.clone();
    let info = tokio::task::spawn_blocking(move || verify_image_bytes(&data))
        .await
        .map_err(|e| UploadError::Verification(e.to_string()))??;

    debug!(
        "Verified {} upload: {}x{}, {} bytes",
        info.mime_type(),
        info.width,
        info.height,
        info.size_bytes
    );

    Ok(ValidatedUpload {
        extension,
        mime_type: info.mime_type().to_string(),
        declared_type: upload.content_type,
        data: upload.data,
        image: Some(info),
    })
}
