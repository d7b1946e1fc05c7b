// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

use super::errors::ApiError;
use super::handlers::{health_handler, index_handler};
use super::process_image::process_image_handler;
use crate::config::RelayConfig;
use crate::models::ModelSelector;
use crate::provider::ProviderState;

/// Shared read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub provider: ProviderState,
    pub selector: Arc<ModelSelector>,
}

impl AppState {
    pub fn new(config: RelayConfig, provider: ProviderState) -> Self {
        let selector = ModelSelector::from_config(&config);
        Self {
            config: Arc::new(config),
            provider,
            selector: Arc::new(selector),
        }
    }
}

/// Build the router
///
/// `/health` always answers. Static assets other than the landing page are
/// gated like every other route when the provider is unconfigured.
pub fn create_app(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.static_dir);

    let gated = Router::new()
        .route("/", get(index_handler))
        .route("/process_image", post(process_image_handler))
        .fallback_service(assets)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_provider,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.config.max_request_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Answer 500 for every gated route while the provider is unconfigured
async fn require_provider(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.provider.is_configured() || request.uri().path() == "/" {
        return next.run(request).await;
    }
    ApiError::ProviderNotConfigured.into_response()
}

pub async fn start_server(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.listen_addr.parse()?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("OCR relay listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("OCR relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
