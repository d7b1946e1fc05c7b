// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload checks for the documents relayed to the provider
//!
//! This module provides:
//! - Extension, size and presence checks for uploaded files
//! - Image identification and decoding for non-PDF uploads

pub mod image_utils;
pub mod upload;

pub use image_utils::{detect_format, verify_image_bytes, ImageError, ImageInfo};
pub use upload::{
    check_upload, file_extension, validate_upload, Upload, UploadError, UploadLimits,
    ValidatedUpload, ALLOWED_EXTENSIONS,
};
