// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, warn};

use super::http_server::AppState;
use crate::version::VERSION_NUMBER;

pub const NOT_CONFIGURED_PAGE: &str = "Server configuration error: Gemini API key missing.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub provider_configured: bool,
    pub default_model: String,
    pub allowed_models: Vec<String>,
    pub version: String,
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        provider_configured: state.provider.is_configured(),
        default_model: state.selector.default_model().to_string(),
        allowed_models: state.selector.allowed().to_vec(),
        version: VERSION_NUMBER.to_string(),
    })
}

/// GET / - landing page, only when the provider is usable
pub async fn index_handler(State(state): State<AppState>) -> Response {
    if !state.provider.is_configured() {
        warn!("Landing page requested while the provider is unconfigured");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            NOT_CONFIGURED_PAGE,
        )
            .into_response();
    }

    let index = ServeFile::new(state.config.index_path());
    match index.oneshot(Request::new(axum::body::Body::empty())).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!("Failed to serve landing page: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
