// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Document text extraction endpoint
//!
//! Provides POST /process_image, which streams extracted text back as
//! `text/plain`.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::process_image_handler;
pub use request::ProcessImageForm;
pub use response::text_stream_response;
