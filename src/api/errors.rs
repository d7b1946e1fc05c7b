// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{error, warn};

use crate::models::SelectionError;
use crate::provider::ProviderError;
use crate::vision::{ImageError, UploadError};

/// JSON body of every pre-stream failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    ValidationError { field: String, message: String },
    PayloadTooLarge { limit: usize },
    InvalidModelSelection(String),
    ProviderNotConfigured,
    ModelUnavailable { model: String },
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::ValidationError { message, .. } => message.clone(),
            ApiError::PayloadTooLarge { limit } => {
                format!("Request exceeds the maximum size of {} bytes", limit)
            }
            ApiError::InvalidModelSelection(msg) => msg.clone(),
            ApiError::ProviderNotConfigured => {
                "Gemini provider is not configured on the server.".to_string()
            }
            ApiError::ModelUnavailable { model } => format!(
                "Error selecting model '{}'. Does it exist and do you have access?",
                model
            ),
            ApiError::InternalError(_) => {
                "A server error occurred before processing.".to_string()
            }
        };

        ErrorResponse { error: message }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_)
            | ApiError::ValidationError { .. }
            | ApiError::PayloadTooLarge { .. }
            | ApiError::InvalidModelSelection(_) => StatusCode::BAD_REQUEST,
            ApiError::ProviderNotConfigured
            | ApiError::ModelUnavailable { .. }
            | ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::PayloadTooLarge { limit } => {
                write!(f, "Payload exceeds limit of {} bytes", limit)
            }
            ApiError::InvalidModelSelection(msg) => write!(f, "Invalid model selection: {}", msg),
            ApiError::ProviderNotConfigured => write!(f, "Provider not configured"),
            ApiError::ModelUnavailable { model } => write!(f, "Model '{}' unavailable", model),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed before streaming: {:?}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        (status, Json(self.to_response())).into_response()
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        let message = match &e {
            UploadError::Image(ImageError::Unidentified) => {
                "Image file could not be identified.".to_string()
            }
            UploadError::Image(ImageError::DecodeFailed(detail)) => {
                warn!("Image decoding failed: {}", detail);
                "Error processing image data.".to_string()
            }
            UploadError::Verification(detail) => {
                return ApiError::InternalError(format!("image verification task: {}", detail));
            }
            other => other.to_string(),
        };
        let field = match e {
            UploadError::DisallowedExtension(_) => "filename",
            _ => "image",
        };

        ApiError::ValidationError {
            field: field.to_string(),
            message,
        }
    }
}

impl From<SelectionError> for ApiError {
    fn from(e: SelectionError) -> Self {
        ApiError::InvalidModelSelection(e.to_string())
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotConfigured(_) => ApiError::ProviderNotConfigured,
            ProviderError::InvalidModel(model) => ApiError::ModelUnavailable { model },
            other => ApiError::InternalError(other.to_string()),
        }
    }
}
