// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod config;
pub mod models;
pub mod provider;
pub mod version;
pub mod vision;

pub use api::{create_app, start_server, AppState};
pub use config::{ModelPolicy, RelayConfig};
pub use models::{ModelSelector, SelectionError};
pub use provider::{
    GenerationBackend, GenerationRequest, GenerativeModel, ProviderError, ProviderState,
    StreamEvent,
};
pub use vision::{validate_upload, Upload, UploadError, UploadLimits, ValidatedUpload};
