// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use ocr_relay::{api::start_server, version, AppState, ProviderState, RelayConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = RelayConfig::parse();
    info!("Starting {}", version::get_version_string());
    info!(
        "Default model: {} (policy: {:?}, allowed: {})",
        config.default_model,
        config.model_policy,
        config.allowed_models.join(", ")
    );

    let provider = ProviderState::configure(&config);
    if !provider.is_configured() {
        warn!("Running without a configured provider; every request will fail with 500");
    }

    start_server(AppState::new(config, provider)).await
}
