// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod errors;
pub mod handlers;
pub mod http_server;
pub mod process_image;
pub mod streaming;

pub use errors::{ApiError, ErrorResponse};
pub use handlers::{HealthResponse, NOT_CONFIGURED_PAGE};
pub use http_server::{create_app, start_server, AppState};
pub use process_image::{process_image_handler, ProcessImageForm};
pub use streaming::{relay_stream, translate, RelayStep, SERVER_ERROR_MARKER};
