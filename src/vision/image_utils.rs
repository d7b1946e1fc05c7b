// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image identification and integrity checks for uploaded files

use image::ImageFormat;
use thiserror::Error;

/// Decoded formats that may be forwarded to the provider
pub const ALLOWED_IMAGE_FORMATS: &[ImageFormat] =
    &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Custom error types for image processing
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Image data is empty")]
    EmptyData,

    #[error("Image file could not be identified")]
    Unidentified,

    #[error("Invalid image format detected: {}", format_name(*.0))]
    UnsupportedFormat(ImageFormat),

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),
}

/// Image information extracted during verification
#[derive(Debug, Clone)]
pub struct ImageInfo {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Detected format
    pub format: ImageFormat,
    /// Size in bytes
    pub size_bytes: usize,
}

impl ImageInfo {
    /// MIME type matching the detected container, e.g. `image/png`
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Identify raw image bytes and fully decode them
///
/// The format is taken from the magic bytes, never from the filename. Formats
/// outside [`ALLOWED_IMAGE_FORMATS`] are rejected before decoding.
///
/// Decoding is CPU-bound; async callers should run this on the blocking pool.
pub fn verify_image_bytes(bytes: &[u8]) -> Result<ImageInfo, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;
    if !ALLOWED_IMAGE_FORMATS.contains(&format) {
        return Err(ImageError::UnsupportedFormat(format));
    }

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    Ok(ImageInfo {
        width: img.width(),
        height: img.height(),
        format,
        size_bytes: bytes.len(),
    })
}

/// Detect image format from magic bytes
///
/// Recognises more containers than are allowed so that a GIF or TIFF upload
/// can be reported by name instead of as unidentifiable.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::Unidentified);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => Err(ImageError::Unidentified),
    }
}

/// Upper-case display name used in client-facing messages
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "PNG",
        ImageFormat::Jpeg => "JPEG",
        ImageFormat::WebP => "WEBP",
        ImageFormat::Gif => "GIF",
        ImageFormat::Bmp => "BMP",
        ImageFormat::Tiff => "TIFF",
        _ => "UNKNOWN",
    }
}
